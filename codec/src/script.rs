use crate::pubkey::CompressedPoint;
use bitcoin::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_1, OP_PUSHNUM_16, OP_RETURN};
use bitcoin::opcodes::Opcode;
use bitcoin::script::Instruction;
use bitcoin::Script;
use std::fmt;

/// nSize values below this are special script shapes, not script lengths.
pub const SPECIAL_SCRIPTS: u64 = 6;

/// Spending condition of an output script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptType {
    PubKeyHash,
    ScriptHash,
    PubKey,
    PubKeyUncompressed,
    WitnessV0KeyHash,
    WitnessV0ScriptHash,
    WitnessV1Taproot,
    WitnessUnknown,
    MultiSig,
    NullData,
    NonStandard,
}

impl ScriptType {
    pub const ALL: [ScriptType; 11] = [
        ScriptType::PubKeyHash,
        ScriptType::ScriptHash,
        ScriptType::PubKey,
        ScriptType::PubKeyUncompressed,
        ScriptType::WitnessV0KeyHash,
        ScriptType::WitnessV0ScriptHash,
        ScriptType::WitnessV1Taproot,
        ScriptType::WitnessUnknown,
        ScriptType::MultiSig,
        ScriptType::NullData,
        ScriptType::NonStandard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::PubKeyHash => "p2pkh",
            ScriptType::ScriptHash => "p2sh",
            ScriptType::PubKey => "p2pk",
            ScriptType::PubKeyUncompressed => "p2pk-uncompressed",
            ScriptType::WitnessV0KeyHash => "p2wpkh",
            ScriptType::WitnessV0ScriptHash => "p2wsh",
            ScriptType::WitnessV1Taproot => "p2tr",
            ScriptType::WitnessUnknown => "witness-unknown",
            ScriptType::MultiSig => "p2ms",
            ScriptType::NullData => "nulldata",
            ScriptType::NonStandard => "non-standard",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The version and program of a segwit output script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WitnessProgram<'a> {
    pub version: u8,
    pub program: &'a [u8],
}

/// Recognizes the multisig and witness program script templates.
pub trait ScriptPatternMatcher {
    fn is_multisig(&self, script: &[u8]) -> bool;

    fn witness_program<'a>(&self, script: &'a [u8]) -> Option<WitnessProgram<'a>>;
}

/// Matches templates with rust-bitcoin's script parser.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardMatcher;

fn small_int(opcode: Opcode) -> Option<u8> {
    let code = opcode.to_u8();
    (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8())
        .contains(&code)
        .then(|| code - OP_PUSHNUM_1.to_u8() + 1)
}

impl ScriptPatternMatcher for StandardMatcher {
    /// `<m> <pubkey>... <n> OP_CHECKMULTISIG` with `1 <= m <= n <= 16`.
    fn is_multisig(&self, script: &[u8]) -> bool {
        let instructions: Result<Vec<_>, _> = Script::from_bytes(script).instructions().collect();
        let Ok(instructions) = instructions else {
            return false;
        };

        let [Instruction::Op(first), keys @ .., Instruction::Op(count), Instruction::Op(last)] =
            instructions.as_slice()
        else {
            return false;
        };

        let (Some(required), Some(total)) = (small_int(*first), small_int(*count)) else {
            return false;
        };

        *last == OP_CHECKMULTISIG
            && required <= total
            && keys.len() == usize::from(total)
            && keys.iter().all(|key| {
                matches!(key, Instruction::PushBytes(bytes) if bytes.len() == 33 || bytes.len() == 65)
            })
    }

    fn witness_program<'a>(&self, script: &'a [u8]) -> Option<WitnessProgram<'a>> {
        let version = Script::from_bytes(script).witness_version()?;
        if !Script::from_bytes(script).is_witness_program() {
            return None;
        }

        Some(WitnessProgram {
            version: version.to_num(),
            program: &script[2..],
        })
    }
}

/// Byte-level heuristics: a trailing OP_CHECKMULTISIG is multisig, a version
/// opcode followed by a push of the rest of the script is a witness program.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicMatcher;

impl ScriptPatternMatcher for HeuristicMatcher {
    fn is_multisig(&self, script: &[u8]) -> bool {
        script.last() == Some(&OP_CHECKMULTISIG.to_u8())
    }

    fn witness_program<'a>(&self, script: &'a [u8]) -> Option<WitnessProgram<'a>> {
        if !(4..=42).contains(&script.len()) || usize::from(script[1]) != script.len() - 2 {
            return None;
        }

        let version = match script[0] {
            0 => 0,
            code => small_int(Opcode::from(code))?,
        };

        Some(WitnessProgram {
            version,
            program: &script[2..],
        })
    }
}

/// Script payload of a chainstate entry, as determined by its nSize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompressedScript {
    /// nSize 0.
    PubKeyHash(Vec<u8>),
    /// nSize 1.
    ScriptHash(Vec<u8>),
    /// nSize 2 or 3; the nSize is the key's parity byte.
    PubKey(CompressedPoint),
    /// nSize 4 or 5; the key is stored compressed but the script used the
    /// uncompressed form.
    PubKeyUncompressed(CompressedPoint),
    /// nSize 6 and above.
    Raw(Vec<u8>),
}

/// Classifies a literal (nSize >= 6) script.
pub fn classify_script<M: ScriptPatternMatcher + ?Sized>(matcher: &M, script: &[u8]) -> ScriptType {
    if script.first() == Some(&OP_RETURN.to_u8()) {
        return ScriptType::NullData;
    }

    if matcher.is_multisig(script) {
        return ScriptType::MultiSig;
    }

    match matcher.witness_program(script) {
        Some(WitnessProgram { version: 0, program }) if program.len() == 20 => {
            ScriptType::WitnessV0KeyHash
        }
        Some(WitnessProgram { version: 0, program }) if program.len() == 32 => {
            ScriptType::WitnessV0ScriptHash
        }
        Some(WitnessProgram { version: 1, program }) if program.len() == 32 => {
            ScriptType::WitnessV1Taproot
        }
        Some(_) => ScriptType::WitnessUnknown,
        None => ScriptType::NonStandard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstate_test_utils::scripts;

    fn classify(script: &[u8]) -> ScriptType {
        classify_script(&StandardMatcher, script)
    }

    #[test]
    fn test_witness_programs() {
        assert_eq!(classify(&scripts::p2wpkh(&[7; 20])), ScriptType::WitnessV0KeyHash);
        assert_eq!(classify(&scripts::p2wsh(&[7; 32])), ScriptType::WitnessV0ScriptHash);
        assert_eq!(classify(&scripts::p2tr(&[7; 32])), ScriptType::WitnessV1Taproot);
        assert_eq!(
            classify(&scripts::witness(2, &[7; 16])),
            ScriptType::WitnessUnknown
        );
        assert_eq!(
            classify(&scripts::witness(1, &[7; 20])),
            ScriptType::WitnessUnknown
        );
        assert_eq!(
            classify(&scripts::witness(0, &[7; 25])),
            ScriptType::WitnessUnknown
        );
    }

    #[test]
    fn test_null_data() {
        assert_eq!(classify(&scripts::op_return(b"hello")), ScriptType::NullData);
        assert_eq!(classify(&[OP_RETURN.to_u8()]), ScriptType::NullData);
    }

    #[test]
    fn test_multisig() {
        let keys = [[2u8; 33], [3u8; 33], [2u8; 33]];
        assert_eq!(classify(&scripts::multisig(2, &keys)), ScriptType::MultiSig);
        assert_eq!(classify(&scripts::multisig(1, &keys[..1])), ScriptType::MultiSig);
    }

    #[test]
    fn test_multisig_requires_consistent_counts() {
        let keys = [[2u8; 33], [3u8; 33]];
        let mut script = scripts::multisig(1, &keys);
        // Claim three keys while only two are pushed.
        let count = script.len() - 2;
        script[count] = OP_PUSHNUM_1.to_u8() + 2;
        assert_eq!(classify(&script), ScriptType::NonStandard);
        // The byte heuristic only looks at the last opcode.
        assert_eq!(classify_script(&HeuristicMatcher, &script), ScriptType::MultiSig);
    }

    #[test]
    fn test_non_standard() {
        assert_eq!(classify(&[]), ScriptType::NonStandard);
        assert_eq!(classify(&[0x76, 0xa9]), ScriptType::NonStandard);
        // Bare P2PKH template stored as a literal script is not special-cased here.
        let mut p2pkh = vec![0x76, 0xa9, 0x14];
        p2pkh.extend([0u8; 20]);
        p2pkh.extend([0x88, 0xac]);
        assert_eq!(classify(&p2pkh), ScriptType::NonStandard);
    }

    #[test]
    fn test_heuristic_matcher_agrees_on_templates() {
        for script in [
            scripts::p2wpkh(&[1; 20]),
            scripts::p2wsh(&[1; 32]),
            scripts::p2tr(&[1; 32]),
            scripts::witness(16, &[1; 2]),
            scripts::op_return(&[1; 10]),
        ] {
            assert_eq!(
                classify_script(&HeuristicMatcher, &script),
                classify(&script),
                "script {}",
                hex::encode(&script)
            );
        }
    }

    #[test]
    fn test_witness_program_exposes_version() {
        let script = scripts::p2tr(&[9; 32]);
        let program = StandardMatcher.witness_program(&script).unwrap();
        assert_eq!(program.version, 1);
        assert_eq!(program.program, &[9; 32]);
    }

    #[test]
    fn test_names() {
        assert_eq!(ScriptType::PubKeyHash.to_string(), "p2pkh");
        assert_eq!(ScriptType::WitnessV1Taproot.to_string(), "p2tr");
        assert_eq!(ScriptType::NonStandard.to_string(), "non-standard");
    }
}
