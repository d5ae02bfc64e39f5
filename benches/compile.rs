//! Benchmark: parse only, parse+compile, and builder-only construction of the demo
//! devices, plus encoding a compiled configuration bundle.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use usbdsl::field::Direction;
use usbdsl::standard::Endpoint;
use usbdsl::{compile_str, parse, Configuration, ConstraintSet, Interface, Options};

const CDC_ACM: &str = include_str!("../demos/cdc_acm.usbd");
const VENDOR_HID: &str = include_str!("../demos/vendor_hid.usbd");

fn wide_configuration(interfaces: u8) -> Configuration {
    let mut cfg = Configuration::new(1);
    for n in 0..interfaces {
        let number = n % 15 + 1;
        let iface = Interface::new(n)
            .class(0xFF, 0, 0)
            .child(Endpoint::bulk(number, Direction::In, 64).and_then(|e| e.build()).expect("ep in"))
            .child(Endpoint::bulk(number, Direction::Out, 64).and_then(|e| e.build()).expect("ep out"))
            .build()
            .expect("interface");
        cfg = cfg.child(iface);
    }
    cfg
}

fn bench_compile(c: &mut Criterion) {
    let options = Options::default();
    c.bench_function("parse_cdc_acm", |b| b.iter(|| parse(black_box(CDC_ACM)).expect("parse")));
    c.bench_function("compile_cdc_acm", |b| {
        b.iter(|| compile_str(black_box(CDC_ACM), &options).expect("compile"))
    });
    c.bench_function("compile_vendor_hid", |b| {
        b.iter(|| compile_str(black_box(VENDOR_HID), &options).expect("compile"))
    });

    let lenient = ConstraintSet::lenient();
    let wide = wide_configuration(32);
    c.bench_function("build_32_interfaces", |b| b.iter(|| black_box(&wide).build(&lenient).expect("build")));

    let built = wide.build(&lenient).expect("build");
    c.bench_function("encode_32_interfaces", |b| b.iter(|| black_box(&built).encode()));
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
