pub mod asciidoc;

pub use asciidoc::ProjectSection;
