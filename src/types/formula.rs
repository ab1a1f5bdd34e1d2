use super::field_ref::FieldRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed calculation formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Number(f64),
    Field(FieldRef),
    Neg(Box<Formula>),
    Binary {
        op: BinaryOp,
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
}

impl Formula {
    /// Parse formula text.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`](crate::ParseError) on malformed input.
    pub fn parse(text: &str) -> Result<Self, crate::ParseError> {
        crate::parse::parse_formula(text)
    }

    /// Field references in the order they appear.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldRef> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<FieldRef>) {
        match self {
            Formula::Number(_) => {}
            Formula::Field(r) => out.push(*r),
            Formula::Neg(inner) => inner.collect_fields(out),
            Formula::Binary { lhs, rhs, .. } => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
        }
    }

    /// Evaluate with `operand` supplying the value of each merge tag.
    /// Division by zero yields zero.
    pub fn eval(&self, operand: &mut impl FnMut(FieldRef) -> f64) -> f64 {
        match self {
            Formula::Number(n) => *n,
            Formula::Field(r) => operand(*r),
            Formula::Neg(inner) => -inner.eval(operand),
            Formula::Binary { op, lhs, rhs } => {
                let a = lhs.eval(operand);
                let b = rhs.eval(operand);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div if b == 0.0 => 0.0,
                    BinaryOp::Div => a / b,
                }
            }
        }
    }
}
