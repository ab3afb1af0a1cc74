//! Managed-vs-foreign classification of existing zone records
//!
//! The reconciler replaces only records this system manages and must
//! preserve everything else byte-for-byte. Classification is content
//! based: a TXT record is ours when its value carries one of the mail
//! signature substrings AND its host matches this domain's composed
//! host names.

use super::records::ZoneLayout;

/// Signature substrings identifying mail-related TXT values
const TXT_SIGNATURES: [&str; 3] = ["spf1", "dkim1", "dmarc1"];

/// Whether an existing zone record belongs to this domain's managed set.
///
/// `kind` is the registrar's record type string ("A", "MX", "TXT", ...).
/// Records of other subdomains, CNAMEs, and unrelated TXT values are
/// foreign.
pub fn is_managed_record(layout: &ZoneLayout, kind: &str, host: &str, value: &str) -> bool {
    match kind.to_ascii_uppercase().as_str() {
        "MX" => host == layout.compose("@"),
        "A" => host == layout.compose("mail"),
        "TXT" => {
            let value_lower = value.to_ascii_lowercase();
            if !TXT_SIGNATURES.iter().any(|sig| value_lower.contains(sig)) {
                return false;
            }
            host == layout.compose("@")
                || host == layout.dmarc_host()
                || is_dkim_host(layout, host)
        }
        _ => false,
    }
}

/// Whether the host is a DKIM selector host for this domain,
/// independent of which selector was used.
fn is_dkim_host(layout: &ZoneLayout, host: &str) -> bool {
    match &layout.prefix {
        None => host.ends_with("._domainkey") || host == "_domainkey",
        Some(prefix) => {
            let suffix = format!("._domainkey.{prefix}");
            host.ends_with(&suffix)
        }
    }
}
