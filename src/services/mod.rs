// Promo core
pub mod eligibility;
pub mod promo_engine;
pub mod quota;

// Administration
pub mod configs;
pub mod programs;

pub use configs::ConfigService;
pub use eligibility::EligibilityResolver;
pub use programs::ProgramService;
pub use promo_engine::PromoEngine;
pub use quota::QuotaCalculator;
