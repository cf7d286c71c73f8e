use proptest::prelude::*;
use shroud_transport::{
    SerializedMessage, TransportDeserializer, TransportSerializer, V2TransportDeserializer,
    V2TransportSerializer,
};

/// Message types the framing must carry: 1..=12 graphic ASCII bytes.
fn arb_msg_type() -> impl Strategy<Value = String> {
    proptest::collection::vec(0x21u8..=0x7e, 1..=12)
        .prop_map(|bytes| String::from_utf8(bytes).expect("graphic ascii"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any message round-trips through the v2 framing, regardless of how
    /// the byte stream is sliced up on the receive side.
    #[test]
    fn v2_roundtrip_with_arbitrary_chunking(
        key_l in any::<[u8; 32]>(),
        key_p in any::<[u8; 32]>(),
        msg_type in arb_msg_type(),
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        chunk in 1usize..97,
    ) {
        let mut tx = V2TransportSerializer::new(key_l, key_p);
        let mut rx = V2TransportDeserializer::new(key_l, key_p);

        // Burn the transport-version placeholder slot.
        let mut placeholder = SerializedMessage::new("x", Vec::new());
        let header = tx.prepare_for_transport(&mut placeholder).unwrap();
        rx.read(&header).unwrap();
        rx.read(&placeholder.payload).unwrap();
        prop_assert!(rx.get_message().unwrap().reject);

        let mut msg = SerializedMessage::new(msg_type.clone(), payload.clone());
        let header = tx.prepare_for_transport(&mut msg).unwrap();
        let mut stream = header;
        stream.extend_from_slice(&msg.payload);

        let mut offset = 0;
        while offset < stream.len() {
            let end = (offset + chunk).min(stream.len());
            offset += rx.read(&stream[offset..end]).unwrap();
        }
        prop_assert!(rx.complete());
        let received = rx.get_message().unwrap();
        prop_assert!(!received.reject);
        prop_assert_eq!(received.msg_type, msg_type);
        prop_assert_eq!(received.payload, payload);
    }
}
