pub mod comment;
pub mod recipe;
pub mod recipe_draft;
pub mod recipe_like;
pub mod store_product;
pub mod user_profile;
