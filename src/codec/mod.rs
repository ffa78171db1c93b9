//! Serialization of individuals, fitnesses, and wire primitives
//!
//! - [`wire`]: big-endian primitive encodings over `std::io` streams
//! - [`text`]: the self-delimiting token codec for human-readable files
//! - [`individual`]: binary and text encodings of whole individuals

pub mod individual;
pub mod text;
pub mod wire;

pub use individual::{
    individual_from_text, individual_to_text, read_fitness, read_genome, read_individual,
    write_fitness, write_genome, write_individual,
};
pub use wire::{WireRead, WireWrite};

/// Prelude for the codec module
pub mod prelude {
    pub use super::individual::{
        individual_from_text, individual_to_text, read_fitness, read_genome, read_individual,
        write_fitness, write_genome, write_individual,
    };
    pub use super::text::TextDecoder;
    pub use super::wire::{WireRead, WireWrite};
}
