use uuid::Uuid;

pub mod competitor;
pub mod credential;
pub mod outcome;
pub mod product;

// Re-exports for convenience
pub use competitor::*;
pub use credential::*;
pub use outcome::*;
pub use product::*;

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
