//! PDF standard security handler, write side.
//!
//! Implements the two handler revisions the exporter offers:
//!
//! - `/V 4 /R 4` with an AESV2 crypt filter (AES-128). Owner and user
//!   entries follow the revision-3 RC4/MD5 construction; object keys are
//!   derived per object with the `sAlT` suffix.
//! - `/V 5 /R 6` with an AESV3 crypt filter (AES-256). Key material comes
//!   from the iterated SHA-2 hash of ISO 32000-2; the file key is random
//!   and wrapped into /UE and /OE.
//!
//! Strings and stream contents are encrypted in place; the encryption
//! dictionary itself and the document ID stay in the clear, as required.
//! Encrypted output is intentionally nondeterministic: salts and CBC IVs
//! are drawn fresh per document.

use crate::{CipherStrength, EncryptionSpec, ExportError};
use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use rand::RngCore;
use rc4::{Rc4, StreamCipher};
use sha2::{Digest, Sha256, Sha384, Sha512};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// Standard password padding from the PDF specification.
const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Encrypt every string and stream of `document` in place and install the
/// encryption dictionary.
///
/// `plain` is the serialized unencrypted document; its digest seeds the
/// document ID that both handler revisions bind to.
pub(crate) fn encrypt_document(
    document: &mut Document,
    spec: &EncryptionSpec,
    plain: &[u8],
) -> Result<(), ExportError> {
    let file_id = md5::compute(plain).0;
    match spec.strength {
        CipherStrength::Aes128 => encrypt_rev4(document, spec, file_id),
        CipherStrength::Aes256 => encrypt_rev6(document, spec, file_id),
    }
}

fn encrypt_rev4(
    document: &mut Document,
    spec: &EncryptionSpec,
    file_id: [u8; 16],
) -> Result<(), ExportError> {
    let p = spec.permissions.p_value();
    let user_password = pad_password(spec.user_password.as_bytes());
    let owner_password = pad_password(spec.effective_owner_password().as_bytes());

    let o = owner_entry_rev3(&owner_password, &user_password)?;
    let file_key = file_key_rev4(&user_password, &o, p, &file_id, spec.encrypt_metadata);
    let u = user_entry_rev3(&file_key, &file_id)?;

    encrypt_objects(document, |id| object_key_aesv2(&file_key, id).to_vec())?;

    let encrypt_id = document.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 4,
        "R" => 4,
        "Length" => 128,
        "CF" => dictionary! {
            "StdCF" => dictionary! {
                "Type" => "CryptFilter",
                "CFM" => "AESV2",
                "AuthEvent" => "DocOpen",
                "Length" => 16,
            },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
        "O" => Object::String(o.to_vec(), StringFormat::Hexadecimal),
        "U" => Object::String(u.to_vec(), StringFormat::Hexadecimal),
        "P" => i64::from(p),
        "EncryptMetadata" => spec.encrypt_metadata,
    });
    install(document, encrypt_id, &file_id);
    Ok(())
}

fn encrypt_rev6(
    document: &mut Document,
    spec: &EncryptionSpec,
    file_id: [u8; 16],
) -> Result<(), ExportError> {
    let p = spec.permissions.p_value();
    let user_password = truncate_password(spec.user_password.as_bytes());
    let owner_password = truncate_password(spec.effective_owner_password().as_bytes());

    let mut file_key = [0u8; 32];
    rand::rng().fill_bytes(&mut file_key);

    // /U and /UE
    let mut user_salts = [0u8; 16];
    rand::rng().fill_bytes(&mut user_salts);
    let (validation, key_salt) = user_salts.split_at(8);
    let mut u = Vec::with_capacity(48);
    u.extend_from_slice(&hash_rev6(user_password, validation, &[])?);
    u.extend_from_slice(validation);
    u.extend_from_slice(key_salt);
    let intermediate = hash_rev6(user_password, key_salt, &[])?;
    let ue = aes256_cbc_zero_iv(&intermediate, &file_key)?;

    // /O and /OE bind to the full 48-byte /U value
    let mut owner_salts = [0u8; 16];
    rand::rng().fill_bytes(&mut owner_salts);
    let (validation, key_salt) = owner_salts.split_at(8);
    let mut o = Vec::with_capacity(48);
    o.extend_from_slice(&hash_rev6(owner_password, validation, &u)?);
    o.extend_from_slice(validation);
    o.extend_from_slice(key_salt);
    let intermediate = hash_rev6(owner_password, key_salt, &u)?;
    let oe = aes256_cbc_zero_iv(&intermediate, &file_key)?;

    let perms = perms_entry(p, spec.encrypt_metadata, &file_key)?;

    encrypt_objects(document, |_| file_key.to_vec())?;

    let encrypt_id = document.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 5,
        "R" => 6,
        "Length" => 256,
        "CF" => dictionary! {
            "StdCF" => dictionary! {
                "Type" => "CryptFilter",
                "CFM" => "AESV3",
                "AuthEvent" => "DocOpen",
                "Length" => 32,
            },
        },
        "StmF" => "StdCF",
        "StrF" => "StdCF",
        "O" => Object::String(o, StringFormat::Hexadecimal),
        "U" => Object::String(u, StringFormat::Hexadecimal),
        "OE" => Object::String(oe, StringFormat::Hexadecimal),
        "UE" => Object::String(ue, StringFormat::Hexadecimal),
        "Perms" => Object::String(perms, StringFormat::Hexadecimal),
        "P" => i64::from(p),
        "EncryptMetadata" => spec.encrypt_metadata,
    });
    install(document, encrypt_id, &file_id);
    Ok(())
}

fn install(document: &mut Document, encrypt_id: ObjectId, file_id: &[u8; 16]) {
    document
        .trailer
        .set("Encrypt", Object::Reference(encrypt_id));
    let id = Object::String(file_id.to_vec(), StringFormat::Hexadecimal);
    document
        .trailer
        .set("ID", Object::Array(vec![id.clone(), id]));
}

/// Pad or truncate a password to the fixed 32-byte form.
fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let take = password.len().min(32);
    padded[..take].copy_from_slice(&password[..take]);
    padded[take..].copy_from_slice(&PAD[..32 - take]);
    padded
}

/// UTF-8 passwords are capped at 127 bytes for the revision-6 handler.
fn truncate_password(password: &[u8]) -> &[u8] {
    &password[..password.len().min(127)]
}

fn rc4_apply(key: &[u8; 16], data: &mut [u8]) -> Result<(), ExportError> {
    let mut cipher = Rc4::<rc4::consts::U16>::new_from_slice(key)
        .map_err(|_| ExportError::Encryption("bad RC4 key length".to_string()))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Revision-3 /O entry: iterated-MD5 key over the owner password, then
/// twenty RC4 passes over the padded user password.
fn owner_entry_rev3(
    owner_password: &[u8; 32],
    user_password: &[u8; 32],
) -> Result<[u8; 32], ExportError> {
    let mut digest = md5::compute(owner_password).0;
    for _ in 0..50 {
        digest = md5::compute(digest).0;
    }

    let mut value = *user_password;
    rc4_apply(&digest, &mut value)?;
    for i in 1..=19u8 {
        let mut pass_key = digest;
        for byte in &mut pass_key {
            *byte ^= i;
        }
        rc4_apply(&pass_key, &mut value)?;
    }
    Ok(value)
}

/// Revision-4 file encryption key (128-bit).
fn file_key_rev4(
    user_password: &[u8; 32],
    o: &[u8; 32],
    p: i32,
    file_id: &[u8; 16],
    encrypt_metadata: bool,
) -> [u8; 16] {
    let mut input = Vec::with_capacity(32 + 32 + 4 + 16 + 4);
    input.extend_from_slice(user_password);
    input.extend_from_slice(o);
    input.extend_from_slice(&p.to_le_bytes());
    input.extend_from_slice(file_id);
    if !encrypt_metadata {
        input.extend_from_slice(&[0xFF; 4]);
    }
    let mut digest = md5::compute(&input).0;
    for _ in 0..50 {
        digest = md5::compute(digest).0;
    }
    digest
}

/// Revision-3 /U entry: MD5 of pad+ID, twenty RC4 passes, zero-padded.
fn user_entry_rev3(file_key: &[u8; 16], file_id: &[u8; 16]) -> Result<[u8; 32], ExportError> {
    let mut input = PAD.to_vec();
    input.extend_from_slice(file_id);
    let mut value = md5::compute(&input).0;

    rc4_apply(file_key, &mut value)?;
    for i in 1..=19u8 {
        let mut pass_key = *file_key;
        for byte in &mut pass_key {
            *byte ^= i;
        }
        rc4_apply(&pass_key, &mut value)?;
    }

    let mut u = [0u8; 32];
    u[..16].copy_from_slice(&value);
    Ok(u)
}

/// Per-object AESV2 key: MD5 over the file key, object number, generation
/// and the fixed `sAlT` suffix.
fn object_key_aesv2(file_key: &[u8; 16], id: ObjectId) -> [u8; 16] {
    let (number, generation) = id;
    let mut input = Vec::with_capacity(16 + 5 + 4);
    input.extend_from_slice(file_key);
    input.extend_from_slice(&number.to_le_bytes()[..3]);
    input.extend_from_slice(&generation.to_le_bytes()[..2]);
    input.extend_from_slice(b"sAlT");
    md5::compute(&input).0
}

/// The iterated hash of ISO 32000-2 §7.6.4.3.4 (revision 6).
fn hash_rev6(password: &[u8], salt: &[u8], user_data: &[u8]) -> Result<[u8; 32], ExportError> {
    let mut key: Vec<u8> = {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        hasher.update(user_data);
        hasher.finalize().to_vec()
    };

    let mut round = 0usize;
    loop {
        let chunk_len = password.len() + key.len() + user_data.len();
        let mut block = Vec::with_capacity(chunk_len * 64);
        for _ in 0..64 {
            block.extend_from_slice(password);
            block.extend_from_slice(&key);
            block.extend_from_slice(user_data);
        }

        let encrypted = Aes128CbcEnc::new_from_slices(&key[..16], &key[16..32])
            .map_err(|_| ExportError::Encryption("bad hash key length".to_string()))?
            .encrypt_padded_vec_mut::<NoPadding>(&block);

        let selector: usize = encrypted[..16].iter().map(|b| *b as usize).sum::<usize>() % 3;
        key = match selector {
            0 => Sha256::digest(&encrypted).to_vec(),
            1 => Sha384::digest(&encrypted).to_vec(),
            _ => Sha512::digest(&encrypted).to_vec(),
        };

        round += 1;
        let last = encrypted.last().copied().unwrap_or(0) as usize;
        if round >= 64 && last <= round - 32 {
            break;
        }
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&key[..32]);
    Ok(out)
}

fn aes256_cbc_zero_iv(key: &[u8; 32], data: &[u8; 32]) -> Result<Vec<u8>, ExportError> {
    let iv = [0u8; 16];
    Ok(Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|_| ExportError::Encryption("bad wrap key length".to_string()))?
        .encrypt_padded_vec_mut::<NoPadding>(data))
}

/// The /Perms entry: permissions echoed under the file key.
fn perms_entry(p: i32, encrypt_metadata: bool, file_key: &[u8; 32]) -> Result<Vec<u8>, ExportError> {
    let mut perms = [0u8; 16];
    perms[..4].copy_from_slice(&p.to_le_bytes());
    perms[4..8].copy_from_slice(&[0xFF; 4]);
    perms[8] = if encrypt_metadata { b'T' } else { b'F' };
    perms[9..12].copy_from_slice(b"adb");
    rand::rng().fill_bytes(&mut perms[12..16]);

    let cipher = aes::Aes256::new_from_slice(file_key)
        .map_err(|_| ExportError::Encryption("bad perms key length".to_string()))?;
    let mut block = aes::Block::clone_from_slice(&perms);
    cipher.encrypt_block(&mut block);
    Ok(block.to_vec())
}

/// AES-CBC with a fresh random IV prepended, PKCS#7 padded.
fn aes_cbc_encrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut iv = [0u8; 16];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| ExportError::Encryption("bad object key length".to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        32 => Aes256CbcEnc::new_from_slices(key, &iv)
            .map_err(|_| ExportError::Encryption("bad object key length".to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        other => {
            return Err(ExportError::Encryption(format!(
                "unsupported object key length {other}"
            )))
        }
    };

    let mut out = Vec::with_capacity(16 + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Encrypt all strings and stream contents, deriving each object's key
/// with `key_for`.
fn encrypt_objects<F>(document: &mut Document, key_for: F) -> Result<(), ExportError>
where
    F: Fn(ObjectId) -> Vec<u8>,
{
    let ids: Vec<ObjectId> = document.objects.keys().copied().collect();
    for id in ids {
        let key = key_for(id);
        if let Some(object) = document.objects.get_mut(&id) {
            encrypt_object(object, &key)?;
        }
    }
    Ok(())
}

fn encrypt_object(object: &mut Object, key: &[u8]) -> Result<(), ExportError> {
    match object {
        Object::String(bytes, format) => {
            let encrypted = aes_cbc_encrypt(key, bytes)?;
            *bytes = encrypted;
            *format = StringFormat::Hexadecimal;
        }
        Object::Array(items) => {
            for item in items {
                encrypt_object(item, key)?;
            }
        }
        Object::Dictionary(dict) => encrypt_dictionary(dict, key)?,
        Object::Stream(stream) => {
            encrypt_dictionary(&mut stream.dict, key)?;
            let encrypted = aes_cbc_encrypt(key, &stream.content)?;
            stream.set_content(encrypted);
        }
        _ => {}
    }
    Ok(())
}

fn encrypt_dictionary(dict: &mut Dictionary, key: &[u8]) -> Result<(), ExportError> {
    for (_, value) in dict.iter_mut() {
        encrypt_object(value, key)?;
    }
    Ok(())
}
