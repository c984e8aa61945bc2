//! Property tests for packet buffer handling

use mediagraph_core::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn size_check_accepts_exactly_the_valid_range(size in -1_000i64..1_000) {
        prop_assert_eq!(check_packet_size(size).is_ok(), size >= 0);
    }

    #[test]
    fn size_check_near_the_limit(offset in 0i64..1_000) {
        prop_assert!(check_packet_size(MAX_PACKET_SIZE - offset).is_ok());
        prop_assert!(check_packet_size(MAX_PACKET_SIZE + 1 + offset).is_err());
    }

    #[test]
    fn scratch_never_shrinks_and_padding_stays_zero(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..16)
    ) {
        let mut scratch = ScratchBuffer::new();
        let mut capacity = 0;
        for payload in &payloads {
            let mut packet = Packet::new();
            scratch
                .alloc_packet(&mut packet, payload.len() as i64)
                .unwrap()
                .copy_from_slice(payload);
            prop_assert!(scratch.capacity() >= capacity);
            prop_assert!(scratch.capacity() >= payload.len() + PADDING);
            capacity = scratch.capacity();

            scratch.make_refcounted(&DefaultAllocator, &mut packet).unwrap();
            prop_assert!(packet.is_refcounted());
            prop_assert_eq!(packet.data(), &payload[..]);
            prop_assert!(packet.padding().unwrap().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn shrink_rezeroes_padding(data in prop::collection::vec(1u8..=255, 1..256), cut in 0usize..256) {
        let cut = cut % data.len();
        let mut packet = Packet::copy_from_slice(&data);
        packet.shrink(cut).unwrap();
        prop_assert_eq!(packet.data(), &data[..cut]);
        prop_assert_eq!(packet.padding().unwrap().len(), PADDING);
        prop_assert!(packet.padding().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn rescale_to_same_base_is_identity(value in -1_000_000i64..1_000_000, den in 1i32..100_000) {
        let tb = Rational::new(1, den);
        prop_assert_eq!(Rational::rescale(value, tb, tb), value);
    }
}
