pub mod extract;
pub mod isbn;

pub use extract::{extract_isbn_from_text, extract_isbns};
pub use isbn::{
    Isbn, convert_isbn10_to_13, convert_isbn13_to_10, strip_isbn, validate_isbn10, validate_isbn13,
};
