use octo_hash::{HashAlgorithm, ObjectId};
use proptest::prelude::*;

proptest! {
    #[test]
    fn sha1_hex_parses_back(raw in proptest::array::uniform20(any::<u8>())) {
        let oid = ObjectId::Sha1(raw);
        let parsed = ObjectId::from_hex(&oid.to_hex()).unwrap();
        prop_assert_eq!(parsed, oid);
        prop_assert_eq!(parsed.algorithm(), HashAlgorithm::Sha1);
    }

    #[test]
    fn prefixes_of_own_hex_match(raw in proptest::array::uniform32(any::<u8>()), len in 1usize..64) {
        let oid = ObjectId::Sha256(raw);
        let hex = oid.to_hex();
        prop_assert!(oid.starts_with_hex(&hex[..len]));
    }
}
