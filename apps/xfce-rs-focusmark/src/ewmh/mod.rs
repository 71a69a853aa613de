pub mod atoms;
