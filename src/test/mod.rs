//! Test support. The draw workload is also driven by the fuzzing harness in
//! the `fuzz/` directory, so this module is compiled outside of tests too.
