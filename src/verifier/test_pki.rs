//! Throwaway certificates for the verifier unit tests

use chrono::{DateTime, TimeZone, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509Name, X509NameBuilder};

use crate::verifier::certificate::Certificate;

pub(crate) struct Issued {
    pub common_name: String,
    pub key: PKey<Private>,
    pub cert: Certificate,
}

pub(crate) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub(crate) fn new_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    name.append_entry_by_text("O", "DCC Test PKI").unwrap();
    name.build()
}

/// Self-signed CA valid 2020 to 2040.
pub(crate) fn root(common_name: &str) -> Issued {
    let key = new_key();
    let cert = build(common_name, common_name, &key, &key, 1, at(2020, 1, 1), at(2040, 1, 1), true);
    Issued {
        common_name: common_name.to_string(),
        key,
        cert,
    }
}

/// Certificate named `common_name`, issued and signed by `issuer`.
pub(crate) fn issue(
    common_name: &str,
    issuer: &Issued,
    serial: u32,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    ca: bool,
) -> Issued {
    let key = new_key();
    let cert = build(
        common_name,
        &issuer.common_name,
        &key,
        &issuer.key,
        serial,
        not_before,
        not_after,
        ca,
    );
    Issued {
        common_name: common_name.to_string(),
        key,
        cert,
    }
}

/// Certificate naming `issuer_cn` as issuer but signed with `signing_key`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build(
    common_name: &str,
    issuer_cn: &str,
    key: &PKey<Private>,
    signing_key: &PKey<Private>,
    serial: u32,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    ca: bool,
) -> Certificate {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name(common_name)).unwrap();
    builder.set_issuer_name(&name(issuer_cn)).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(not_before.timestamp()).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after.timestamp()).unwrap())
        .unwrap();
    if ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
    }
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    Certificate::from_x509(builder.build()).unwrap()
}
