//! See [`tabdraw::test::draw_workload`] for documentation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tabdraw::test::draw_workload::Workload;

fuzz_target!(|data: Workload| {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        data.run().await;
    });
});
