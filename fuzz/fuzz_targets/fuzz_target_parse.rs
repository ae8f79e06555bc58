#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use pg_provider::{build_target, ConnectionConfig, ConnectionTarget};

#[derive(Debug)]
struct TargetInput {
    raw: String,
    user: String,
    password: String,
    host: String,
    port: u16,
    database: String,
}

impl<'a> Arbitrary<'a> for TargetInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        Ok(Self {
            raw: u.arbitrary()?,
            user: u.arbitrary()?,
            password: u.arbitrary()?,
            host: u.arbitrary()?,
            port: u.arbitrary()?,
            database: u.arbitrary()?,
        })
    }
}

fuzz_target!(|input: TargetInput| {
    // Arbitrary text must never panic the parser
    let _ = ConnectionTarget::parse(&input.raw);

    let Ok(config) = ConnectionConfig::new(
        input.user,
        input.password,
        input.host,
        input.port,
        input.database,
    ) else {
        return;
    };

    let target = build_target(&config);
    let parsed = ConnectionTarget::parse(&target.to_url()).expect("rendered URL must parse");
    assert_eq!(parsed.user(), config.user());
    assert_eq!(parsed.expose_password(), config.expose_password());
    assert_eq!(parsed.host(), config.host());
    assert_eq!(parsed.port(), config.port());
    assert_eq!(parsed.database(), config.database());
});
