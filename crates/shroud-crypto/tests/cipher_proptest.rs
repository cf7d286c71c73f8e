use proptest::prelude::*;
use shroud_crypto::{Bip324CipherSuite, EllSwiftPubKey, HeaderFlags, MIN_PACKET_LEN};

proptest! {
    /// Any (aad, contents, flags) combination survives an
    /// encrypt/decrypt round-trip between two synchronized suites.
    #[test]
    fn packet_roundtrip(
        key_l in any::<[u8; 32]>(),
        key_p in any::<[u8; 32]>(),
        aad in prop::collection::vec(any::<u8>(), 0..64),
        contents in prop::collection::vec(any::<u8>(), 0..4096),
        ignore in any::<bool>(),
    ) {
        let mut tx = Bip324CipherSuite::new(key_l, key_p);
        let mut rx = Bip324CipherSuite::new(key_l, key_p);
        let flags = if ignore { HeaderFlags::IGNORE } else { HeaderFlags::NONE };

        let mut packet = vec![0u8; MIN_PACKET_LEN + contents.len()];
        tx.encrypt(&aad, &contents, flags, &mut packet).unwrap();

        let length = rx.decrypt_length(&packet[..3].try_into().unwrap());
        prop_assert_eq!(length as usize, contents.len());

        let mut decrypted = vec![0u8; contents.len()];
        let got = rx.decrypt(&aad, &packet[3..], &mut decrypted).unwrap();
        prop_assert_eq!(decrypted, contents);
        prop_assert_eq!(got.ignore(), ignore);
    }

    /// Every 64-byte string is a valid EllSwift encoding of some point.
    #[test]
    fn ellswift_decode_is_total(bytes in any::<[u8; 64]>()) {
        let key = EllSwiftPubKey::from_array(bytes);
        let first = key.decode();
        prop_assert_eq!(first, key.decode());
    }
}
