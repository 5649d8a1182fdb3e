#![allow(clippy::cast_precision_loss)]

mod bayesian;
mod genetic;
mod grid;
mod random;
mod seed;
