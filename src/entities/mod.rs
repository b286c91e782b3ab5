pub mod promo_config;
pub mod promo_program;
pub mod promo_transaction;
