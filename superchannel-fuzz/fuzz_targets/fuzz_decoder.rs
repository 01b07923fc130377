#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use superchannel_resp::{encode_command, RespDecoder, RespValue};

fuzz_target!(|data: &[u8]| {
    let decoder = RespDecoder::new().with_max_bulk_len(1 << 20);

    // Whole input at once: decode until it stalls or errors.
    let mut whole = BytesMut::from(data);
    let mut decoded = Vec::new();
    while let Ok(Some(value)) = decoder.decode(&mut whole) {
        decoded.push(value);
    }

    // Byte by byte must agree with the whole-input pass.
    let mut trickle = BytesMut::new();
    let mut trickled = Vec::new();
    for &byte in data {
        trickle.extend_from_slice(&[byte]);
        match decoder.decode(&mut trickle) {
            Ok(Some(value)) => trickled.push(value),
            Ok(None) => {}
            Err(_) => break,
        }
    }
    assert_eq!(decoded, trickled);

    // Requests we encode must decode back to bulk arrays.
    let args: Vec<&[u8]> = data.split(|&b| b == b' ').take(16).collect();
    let mut request = BytesMut::new();
    encode_command(&args, &mut request);
    match decoder.decode(&mut request) {
        Ok(Some(RespValue::Array(Some(items)))) => assert_eq!(items.len(), args.len()),
        other => panic!("encoded request did not decode: {other:?}"),
    }
});
