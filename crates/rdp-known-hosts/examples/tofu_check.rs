//! TOFU check — the decision a client makes when a server presents a
//! certificate.
//!
//! Run with:
//!   cargo run --example tofu_check -p rdp-known-hosts -- <store-dir> <host> <port> <cert.pem>

use rdp_known_hosts::{CertificateData, CertificateStore, TrustStatus};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [store_dir, host, port, cert] = args.as_slice() else {
        eprintln!("usage: tofu_check <store-dir> <host> <port> <cert.pem>");
        std::process::exit(2);
    };
    let port: u16 = port.parse()?;

    // ── 1. Describe what the server presented ───────────────────────────────
    let presented = CertificateData::from_pem(host, port, &std::fs::read(cert)?)?;
    println!("Presented by {host}:{port}");
    println!("  Subject:     {}", presented.subject());
    println!("  Issuer:      {}", presented.issuer());
    println!("  Fingerprint: {}", presented.fingerprint());
    println!();

    // ── 2. Compare with what was seen before ────────────────────────────────
    let store = CertificateStore::new(store_dir);
    match store.contains(&presented)? {
        TrustStatus::Trusted => println!("Known certificate, connecting."),
        TrustStatus::Unknown => {
            // First contact: a real client asks the user before saving.
            store.save(&presented)?;
            println!("First contact, certificate remembered.");
        }
        TrustStatus::Mismatch(stored) => {
            println!("WARNING: certificate changed since last connection!");
            println!("  Stored fingerprint: {}", stored.fingerprint());
            std::process::exit(1);
        }
    }

    Ok(())
}
