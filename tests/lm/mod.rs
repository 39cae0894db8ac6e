// Tests for the Levenberg-Marquardt minimizer

mod problems;
