//! Raw output scripts for building literal (nSize >= 6) entries.

use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_PUSHBYTES_0, OP_PUSHDATA1, OP_PUSHNUM_1, OP_RETURN,
};

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    if data.len() < OP_PUSHDATA1.to_u8() as usize {
        script.push(OP_PUSHBYTES_0.to_u8() + data.len() as u8);
    } else {
        script.push(OP_PUSHDATA1.to_u8());
        script.push(data.len() as u8);
    }
    script.extend_from_slice(data);
}

fn small_int(n: u8) -> u8 {
    assert!((1..=16).contains(&n));
    OP_PUSHNUM_1.to_u8() + n - 1
}

/// `<version> <program>`, with any version and program length.
pub fn witness(version: u8, program: &[u8]) -> Vec<u8> {
    let mut script = match version {
        0 => vec![OP_PUSHBYTES_0.to_u8()],
        v => vec![small_int(v)],
    };
    push_data(&mut script, program);
    script
}

pub fn p2wpkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    witness(0, pubkey_hash)
}

pub fn p2wsh(script_hash: &[u8; 32]) -> Vec<u8> {
    witness(0, script_hash)
}

pub fn p2tr(output_key: &[u8; 32]) -> Vec<u8> {
    witness(1, output_key)
}

/// `OP_RETURN <data>`.
pub fn op_return(data: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_RETURN.to_u8()];
    push_data(&mut script, data);
    script
}

/// `<m> <key>... <n> OP_CHECKMULTISIG`.
pub fn multisig(required: u8, keys: &[[u8; 33]]) -> Vec<u8> {
    let mut script = vec![small_int(required)];
    for key in keys {
        push_data(&mut script, key);
    }
    script.push(small_int(keys.len() as u8));
    script.push(OP_CHECKMULTISIG.to_u8());
    script
}
