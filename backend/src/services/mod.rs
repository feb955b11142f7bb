pub mod offer_letter;
pub mod templates;
