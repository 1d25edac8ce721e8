//! Register request plans.
//!
//! A plan is the ordered list of (register, half) byte fields one logical
//! query needs, built once and immutable afterwards. Registers are grouped
//! into maximal contiguous spans so a non-contiguous map still costs only one
//! request per span, and the extraction step zips the span payloads back into
//! one byte per requested field, in request order. The field count coming out
//! must equal the field count asked for; a mismatch means the register map and
//! the device disagree, which is a protocol bug, not a retryable condition.

use crate::error::DecodeError;

/// Which byte of a 16-bit register a field selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterHalf {
    High,
    Low,
}

/// One contiguous read-holding-registers request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u16,
    pub count: u16,
}

impl Span {
    /// Expected payload length in bytes for this span.
    pub fn payload_len(&self) -> usize {
        self.count as usize * 2
    }
}

/// Ordered (register, half) fields plus the spans that fetch them.
#[derive(Debug, Clone)]
pub struct RegisterRequestPlan {
    fields: Vec<(u16, RegisterHalf)>,
    spans: Vec<Span>,
}

impl RegisterRequestPlan {
    pub fn builder() -> PlanBuilder {
        PlanBuilder { fields: Vec::new() }
    }

    /// Convenience plan covering one contiguous block of whole registers.
    pub fn contiguous(start: u16, count: u16) -> Self {
        let mut builder = Self::builder();
        for register in start..start + count {
            builder = builder.register(register);
        }
        builder.build()
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Zips the per-span payloads back into one byte per requested field.
    ///
    /// `payloads` must hold one entry per span, in span order, each of the
    /// exact length the span announced.
    pub fn extract(&self, payloads: &[Vec<u8>]) -> Result<Vec<u8>, DecodeError> {
        if payloads.len() != self.spans.len() {
            return Err(DecodeError::FieldCountMismatch {
                expected: self.spans.len(),
                received: payloads.len(),
            });
        }
        for (span, payload) in self.spans.iter().zip(payloads) {
            if payload.len() != span.payload_len() {
                return Err(DecodeError::PayloadLength {
                    register: span.start,
                    expected: span.payload_len(),
                    received: payload.len(),
                });
            }
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for &(register, half) in &self.fields {
            // Spans are built from the field list, so every field register is
            // covered by exactly one span.
            let (span_index, span) = self
                .spans
                .iter()
                .enumerate()
                .find(|(_, span)| register >= span.start && register < span.start + span.count)
                .unwrap_or_else(|| unreachable!("field register {register:#06X} outside all spans"));
            let offset = (register - span.start) as usize * 2
                + match half {
                    RegisterHalf::High => 0,
                    RegisterHalf::Low => 1,
                };
            fields.push(payloads[span_index][offset]);
        }
        Ok(fields)
    }
}

/// Builds a [`RegisterRequestPlan`] field by field, in wire order.
#[derive(Debug)]
pub struct PlanBuilder {
    fields: Vec<(u16, RegisterHalf)>,
}

impl PlanBuilder {
    /// Adds a single byte field.
    pub fn byte(mut self, register: u16, half: RegisterHalf) -> Self {
        self.fields.push((register, half));
        self
    }

    /// Adds both bytes of a register, high byte first.
    pub fn register(self, register: u16) -> Self {
        self.byte(register, RegisterHalf::High)
            .byte(register, RegisterHalf::Low)
    }

    /// Adds the four bytes of a word-swapped float spanning `register` and
    /// `register + 1`, in wire order.
    pub fn float32(self, register: u16) -> Self {
        self.register(register).register(register + 1)
    }

    pub fn build(self) -> RegisterRequestPlan {
        let mut registers: Vec<u16> = self.fields.iter().map(|&(register, _)| register).collect();
        registers.sort_unstable();
        registers.dedup();

        let mut spans: Vec<Span> = Vec::new();
        for register in registers {
            match spans.last_mut() {
                Some(span) if register == span.start + span.count => span.count += 1,
                _ => spans.push(Span {
                    start: register,
                    count: 1,
                }),
            }
        }

        RegisterRequestPlan {
            fields: self.fields,
            spans,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn contiguous_registers_collapse_into_one_span() {
        let plan = RegisterRequestPlan::contiguous(0x7000, 4);
        assert_eq!(
            plan.spans(),
            [Span {
                start: 0x7000,
                count: 4
            }]
        );
        assert_eq!(plan.field_count(), 8);
    }

    #[test]
    fn gap_in_register_map_produces_two_spans() {
        let plan = RegisterRequestPlan::builder()
            .float32(0x1600)
            .float32(0x1610)
            .build();
        assert_eq!(
            plan.spans(),
            [
                Span {
                    start: 0x1600,
                    count: 2
                },
                Span {
                    start: 0x1610,
                    count: 2
                }
            ]
        );
    }

    #[test]
    fn extraction_preserves_request_order() {
        // Ask for the low byte before the high byte; the output must follow
        // the request order, not the wire order.
        let plan = RegisterRequestPlan::builder()
            .byte(0x0010, RegisterHalf::Low)
            .byte(0x0010, RegisterHalf::High)
            .byte(0x0011, RegisterHalf::High)
            .build();
        let fields = plan.extract(&[vec![0xAB, 0xCD, 0x12, 0x34]]).unwrap();
        assert_eq!(fields, [0xCD, 0xAB, 0x12]);
    }

    #[test]
    fn extraction_across_spans() {
        let plan = RegisterRequestPlan::builder()
            .float32(0x1600)
            .float32(0x1610)
            .build();
        let fields = plan
            .extract(&[vec![1, 2, 3, 4], vec![5, 6, 7, 8]])
            .unwrap();
        assert_eq!(fields, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn wrong_payload_count_is_a_decode_error() {
        let plan = RegisterRequestPlan::builder()
            .float32(0x1600)
            .float32(0x1610)
            .build();
        assert_matches!(
            plan.extract(&[vec![1, 2, 3, 4]]),
            Err(DecodeError::FieldCountMismatch {
                expected: 2,
                received: 1
            })
        );
    }

    #[test]
    fn short_span_payload_is_a_decode_error() {
        let plan = RegisterRequestPlan::contiguous(0x7000, 2);
        assert_matches!(
            plan.extract(&[vec![1, 2, 3]]),
            Err(DecodeError::PayloadLength {
                register: 0x7000,
                expected: 4,
                received: 3
            })
        );
    }
}
