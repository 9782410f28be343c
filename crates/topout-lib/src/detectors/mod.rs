pub mod attempts;
pub mod climbing;
