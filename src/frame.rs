//! Modbus RTU frame building and validation.
//!
//! The meters speak plain RTU framing, usually behind a serial-to-TCP bridge
//! that forwards raw bytes. A request for function 0x03 is
//! `[addr][0x03][regHi][regLo][cntHi][cntLo][crcLo][crcHi]`, a response is
//! `[addr][0x03][byteCount][data...][crcLo][crcHi]`. The CRC-16/Modbus
//! checksum covers every preceding byte and travels low byte first.

use crate::error::FrameError;

/// Function code for reading holding registers, the only one the gateway uses.
pub const READ_HOLDING_REGISTERS: u8 = 0x03;

/// Bit set in the echoed function code when the slave reports an exception.
const EXCEPTION_FLAG: u8 = 0x80;

const MODBUS: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// Computes the CRC-16/Modbus checksum over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS.checksum(data)
}

/// Builds a read-holding-registers request frame with a trailing checksum.
pub fn encode_read_holding(address: u8, register: u16, count: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(address);
    frame.push(READ_HOLDING_REGISTERS);
    frame.extend_from_slice(&register.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Appends the CRC-16/Modbus checksum of `frame`, low byte first.
pub fn append_crc(frame: &mut Vec<u8>) {
    let checksum = crc16(frame);
    frame.extend_from_slice(&checksum.to_le_bytes());
}

/// Validates a raw response frame and returns its data payload.
///
/// A frame is trusted only after every check passes: length floor, address
/// echo, function-code echo, checksum, declared byte count. A slave exception
/// (`function | 0x80`) with a valid checksum is reported as
/// [`FrameError::DeviceException`] so callers can tell a protocol refusal from
/// line corruption.
pub fn validate_response<'a>(
    response: &'a [u8],
    expected_address: u8,
    expected_function: u8,
) -> Result<&'a [u8], FrameError> {
    // The shortest well-formed frame is an exception: address, function,
    // exception code and the two checksum bytes.
    if response.len() < 5 {
        return Err(FrameError::TooShort(response.len()));
    }
    if response[0] != expected_address {
        return Err(FrameError::AddressMismatch {
            expected: expected_address,
            received: response[0],
        });
    }
    let function = response[1];
    if function != expected_function && function != (expected_function | EXCEPTION_FLAG) {
        return Err(FrameError::FunctionMismatch {
            expected: expected_function,
            received: function,
        });
    }

    let (body, tail) = response.split_at(response.len() - 2);
    let expected_crc = crc16(body);
    let received_crc = u16::from_le_bytes([tail[0], tail[1]]);
    if expected_crc != received_crc {
        return Err(FrameError::ChecksumMismatch {
            expected: expected_crc,
            received: received_crc,
        });
    }

    if function == (expected_function | EXCEPTION_FLAG) {
        return Err(FrameError::DeviceException(response[2]));
    }

    let payload = &body[3..];
    if response[2] as usize != payload.len() {
        return Err(FrameError::LengthMismatch {
            declared: response[2],
            actual: payload.len(),
        });
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn encode_matches_reference_frame() {
        // Request from the Modbus specification examples:
        // slave 0x11, registers 0x006B..0x006D, CRC 0x76 0x87 on the wire.
        assert_eq!(
            encode_read_holding(0x11, 0x006B, 0x0003),
            [0x11, 0x03, 0x00, 0x6B, 0x00, 0x03, 0x76, 0x87]
        );
    }

    #[test]
    fn encode_serial_number_request() {
        // TM3 serial number query, CRC checked against an independent CRC-16/Modbus implementation.
        assert_eq!(
            encode_read_holding(0x01, 0xEF04, 0x0004),
            [0x01, 0x03, 0xEF, 0x04, 0x00, 0x04, 0x31, 0x1C]
        );
    }

    #[test]
    fn appended_crc_revalidates() {
        let mut frame = vec![0x01, 0x03, 0x02, 0x00, 0x01];
        append_crc(&mut frame);
        assert_eq!(&frame[5..], [0x79, 0x84]);
        assert_matches!(validate_response(&frame, 0x01, 0x03), Ok(payload) if payload == [0x00, 0x01]);
    }

    #[test]
    fn any_flipped_bit_fails_validation() {
        let mut frame = vec![0x01, 0x03, 0x02, 0x00, 0x01];
        append_crc(&mut frame);
        for byte in 0..frame.len() - 2 {
            for bit in 0..8 {
                let mut corrupt = frame.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    validate_response(&corrupt, 0x01, 0x03).is_err(),
                    "flipping byte {byte} bit {bit} must not validate"
                );
            }
        }
    }

    #[test]
    fn short_frame_rejected() {
        assert_matches!(
            validate_response(&[0x01, 0x03], 0x01, 0x03),
            Err(FrameError::TooShort(2))
        );
    }

    #[test]
    fn address_and_function_echo_checked() {
        let mut frame = vec![0x02, 0x03, 0x02, 0x00, 0x01];
        append_crc(&mut frame);
        assert_matches!(
            validate_response(&frame, 0x01, 0x03),
            Err(FrameError::AddressMismatch {
                expected: 0x01,
                received: 0x02
            })
        );

        let mut frame = vec![0x01, 0x04, 0x02, 0x00, 0x01];
        append_crc(&mut frame);
        assert_matches!(
            validate_response(&frame, 0x01, 0x03),
            Err(FrameError::FunctionMismatch {
                expected: 0x03,
                received: 0x04
            })
        );
    }

    #[test]
    fn checksum_mismatch_reports_both_values() {
        let mut frame = vec![0x01, 0x03, 0x02, 0x00, 0x01];
        append_crc(&mut frame);
        let valid = u16::from_le_bytes([frame[5], frame[6]]);
        frame[5] ^= 0xFF;
        assert_matches!(
            validate_response(&frame, 0x01, 0x03),
            Err(FrameError::ChecksumMismatch { expected, received })
                if expected == valid && received != valid
        );
    }

    #[test]
    fn device_exception_surfaced() {
        // Exception response: illegal data address (0x02).
        let mut frame = vec![0x01, 0x83, 0x02];
        append_crc(&mut frame);
        assert_matches!(
            validate_response(&frame, 0x01, 0x03),
            Err(FrameError::DeviceException(0x02))
        );
    }

    #[test]
    fn declared_byte_count_checked() {
        let mut frame = vec![0x01, 0x03, 0x04, 0x00, 0x01];
        append_crc(&mut frame);
        assert_matches!(
            validate_response(&frame, 0x01, 0x03),
            Err(FrameError::LengthMismatch {
                declared: 4,
                actual: 2
            })
        );
    }
}
