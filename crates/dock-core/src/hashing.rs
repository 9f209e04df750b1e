//! Hash helpers – abstracción para permitir cambiar de algoritmo sin tocar
//! el resto del core.

use blake3::Hasher;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Fingerprint de la membresía de un batch: los ids de miembros en orden,
/// separados por newline. El mismo input produce siempre el mismo hash, que
/// es lo que habilita el skip-if-unchanged y la detección de `InputConflict`
/// durante un resume.
pub fn membership_fingerprint<S: AsRef<str>>(member_ids: &[S]) -> String {
    let joined: Vec<&str> = member_ids.iter().map(|s| s.as_ref()).collect();
    hash_str(&joined.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_order_sensitive() {
        let a = membership_fingerprint(&["m1", "m2"]);
        let b = membership_fingerprint(&["m2", "m1"]);
        assert_ne!(a, b);
        assert_eq!(a, membership_fingerprint(&["m1", "m2"]));
    }
}
