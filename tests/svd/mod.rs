// Tests for the singular value decomposition

mod decomposition;
mod solving;
