pub mod combined_oi;

pub use combined_oi::aggregate;
