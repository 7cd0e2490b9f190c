//! Program test suite, one module per concern.

mod test_helpers;
