//! Compiler fuzz target: feed arbitrary text through parse and compile.
//! Compilation must not panic; every input ends in Ok(DescriptorSet) or Err(DescriptorError).
//! Build with: cargo fuzz run compile_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(set) = usbdsl::compile_str(s, &usbdsl::Options::lenient()) {
        let _ = set.buffers();
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run compile_fuzz");
}
