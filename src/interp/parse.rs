//! Instruction text grammar (§6): tokens space-separated, statements
//! `;`-separated. Used by `screen -c` and by the generator's own rendering
//! of random instructions into the same textual form.

use crate::error::SystemError;
use crate::process::{Instruction, Operand};

/// Parse a `;`-separated instruction program. §6: 1-50 instructions.
pub fn parse_program(text: &str) -> Result<Vec<Instruction>, SystemError> {
    let statements: Vec<&str> = text.split(';').map(str::trim).filter(|s| !s.is_empty()).collect();
    if statements.is_empty() || statements.len() > 50 {
        return Err(SystemError::BadInstructionText(format!(
            "program must have 1-50 instructions, got {}",
            statements.len()
        )));
    }
    statements.iter().map(|s| parse_statement(s)).collect()
}

fn parse_statement(stmt: &str) -> Result<Instruction, SystemError> {
    let tokens: Vec<&str> = stmt.split_whitespace().collect();
    let bad = || SystemError::BadInstructionText(stmt.to_string());

    match tokens.first().copied() {
        Some("DECLARE") => {
            let [_, name, lit] = take3(&tokens).ok_or_else(bad)?;
            let value: u16 = lit.parse().map_err(|_| bad())?;
            Ok(Instruction::Declare { name: name.to_string(), value })
        }
        Some("ADD") => {
            let [_, dst, s1, s2] = take4(&tokens).ok_or_else(bad)?;
            Ok(Instruction::Add { dst: dst.to_string(), src1: parse_operand(s1), src2: parse_operand(s2) })
        }
        Some("SUBTRACT") | Some("SUB") => {
            let [_, dst, s1, s2] = take4(&tokens).ok_or_else(bad)?;
            Ok(Instruction::Sub { dst: dst.to_string(), src1: parse_operand(s1), src2: parse_operand(s2) })
        }
        Some("SLEEP") => {
            let [_, n] = take2(&tokens).ok_or_else(bad)?;
            let ticks: u8 = n.parse().map_err(|_| bad())?;
            Ok(Instruction::Sleep { ticks })
        }
        Some("PRINT") => parse_print(stmt, &tokens),
        Some("READ") => {
            let [_, dst, addr] = take3(&tokens).ok_or_else(bad)?;
            Ok(Instruction::Read { dst: dst.to_string(), address: addr.to_string() })
        }
        Some("WRITE") => {
            let [_, addr, src] = take3(&tokens).ok_or_else(bad)?;
            Ok(Instruction::Write { address: addr.to_string(), src: parse_operand(src) })
        }
        _ => Err(bad()),
    }
}

fn parse_print(stmt: &str, tokens: &[&str]) -> Result<Instruction, SystemError> {
    // `PRINT` (no operands) or `PRINT ("msg" + var)`.
    if tokens.len() == 1 {
        return Ok(Instruction::Print { var: None, message: String::new() });
    }
    let rest = stmt["PRINT".len()..].trim();
    let rest = rest.trim_start_matches('(').trim_end_matches(')');
    if let Some((msg_part, var_part)) = rest.split_once('+') {
        let message = msg_part.trim().trim_matches('"').to_string();
        let var = var_part.trim().to_string();
        Ok(Instruction::Print { var: Some(var), message })
    } else {
        let message = rest.trim().trim_matches('"').to_string();
        Ok(Instruction::Print { var: None, message })
    }
}

fn parse_operand(tok: &str) -> Operand {
    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        if let Ok(v) = u16::from_str_radix(hex, 16) {
            return Operand::Literal(v);
        }
    }
    if let Ok(v) = tok.parse::<u16>() {
        return Operand::Literal(v);
    }
    Operand::Var(tok.to_string())
}

fn take2<'a>(tokens: &[&'a str]) -> Option<[&'a str; 2]> {
    if tokens.len() == 2 {
        Some([tokens[0], tokens[1]])
    } else {
        None
    }
}

fn take3<'a>(tokens: &[&'a str]) -> Option<[&'a str; 3]> {
    if tokens.len() == 3 {
        Some([tokens[0], tokens[1], tokens[2]])
    } else {
        None
    }
}

fn take4<'a>(tokens: &[&'a str]) -> Option<[&'a str; 4]> {
    if tokens.len() == 4 {
        Some([tokens[0], tokens[1], tokens[2], tokens[3]])
    } else {
        None
    }
}

/// Parse a hex address literal (e.g. `"0x1A"`). Unparseable text reaches
/// the caller as `None`, which is a memory access violation (§4.2, §7),
/// exactly like an out-of-range address.
pub fn parse_hex_address(text: &str) -> Option<u64> {
    let hex = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))?;
    u64::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_seven_opcodes() {
        let program = parse_program(
            "DECLARE a 7; ADD b a 1; SUBTRACT c b a; SLEEP 2; PRINT; READ d 0x0; WRITE 0x0 a",
        )
        .unwrap();
        assert_eq!(program.len(), 7);
    }

    #[test]
    fn print_with_message_and_var() {
        let program = parse_program(r#"PRINT ("Value is " + x)"#).unwrap();
        match &program[0] {
            Instruction::Print { var, message } => {
                assert_eq!(var.as_deref(), Some("x"));
                assert_eq!(message, "Value is ");
            }
            _ => panic!("expected Print"),
        }
    }

    #[test]
    fn rejects_more_than_fifty_statements() {
        let text = (0..51).map(|_| "SLEEP 1").collect::<Vec<_>>().join(";");
        assert!(parse_program(&text).is_err());
    }

    #[test]
    fn rejects_empty_program() {
        assert!(parse_program("").is_err());
    }

    #[test]
    fn hex_address_parses_and_rejects_garbage() {
        assert_eq!(parse_hex_address("0x1A"), Some(0x1A));
        assert_eq!(parse_hex_address("garbage"), None);
    }
}
