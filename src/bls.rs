//! BLS12-381 keys and signatures for the augmented signature scheme, on top of
//! the blst primitives.
//!
//! All three types keep their canonical encodings (32-byte big-endian scalar,
//! 48-byte compressed G1 point, 96-byte compressed G2 point), so equality and
//! hashing compare canonical bytes. Encodings are validated on construction.

use crate::error::KeyError;
use blst::{
    blst_bendian_from_scalar, blst_derive_child_eip2333, blst_final_exp, blst_fp12,
    blst_fp12_is_one, blst_fp12_mul, blst_fr, blst_fr_add, blst_fr_from_scalar, blst_fr_sub,
    blst_hash_to_g2, blst_miller_loop, blst_p1, blst_p1_add_or_double, blst_p1_affine,
    blst_p1_affine_in_g1, blst_p1_cneg, blst_p1_compress, blst_p1_from_affine,
    blst_p1_to_affine, blst_p1_uncompress, blst_p2, blst_p2_add_or_double, blst_p2_affine,
    blst_p2_affine_in_g2, blst_p2_compress, blst_p2_from_affine, blst_p2_to_affine,
    blst_p2_uncompress, blst_scalar, blst_scalar_fr_check, blst_scalar_from_be_bytes,
    blst_scalar_from_bendian, blst_scalar_from_fr, blst_sign_pk_in_g1, blst_sk_to_pk_in_g1,
    BLS12_381_G1, BLST_ERROR,
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Domain separation tag of the augmented scheme.
pub const AUG_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_AUG_";

pub const SCALAR_SIZE: usize = 32;
pub const PUBLIC_KEY_SIZE: usize = 48;
pub const SIGNATURE_SIZE: usize = 96;

fn infinity<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes[0] = 0xc0;
    bytes
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// First four bytes of the sha256 of a compressed public key.
fn fingerprint_of(bytes: &[u8]) -> u32 {
    let digest = sha256(&[bytes]);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn blst_scalar_of(bytes: &[u8; SCALAR_SIZE]) -> blst_scalar {
    let mut scalar = blst_scalar::default();
    unsafe { blst_scalar_from_bendian(&mut scalar, bytes.as_ptr()) };
    scalar
}

fn bendian_of(scalar: &blst_scalar) -> [u8; SCALAR_SIZE] {
    let mut bytes = [0u8; SCALAR_SIZE];
    unsafe { blst_bendian_from_scalar(bytes.as_mut_ptr(), scalar) };
    bytes
}

fn fr_of(bytes: &[u8; SCALAR_SIZE]) -> blst_fr {
    let mut fr = blst_fr::default();
    unsafe { blst_fr_from_scalar(&mut fr, &blst_scalar_of(bytes)) };
    fr
}

fn bendian_of_fr(fr: &blst_fr) -> [u8; SCALAR_SIZE] {
    let mut scalar = blst_scalar::default();
    unsafe { blst_scalar_from_fr(&mut scalar, fr) };
    bendian_of(&scalar)
}

/// Reduces an unsigned big-endian integer of any length modulo the group order.
fn reduce(bytes: &[u8]) -> [u8; SCALAR_SIZE] {
    let mut scalar = blst_scalar::default();
    unsafe { blst_scalar_from_be_bytes(&mut scalar, bytes.as_ptr(), bytes.len()) };
    bendian_of(&scalar)
}

// Encodings held by PublicPoint and Signature were validated on construction,
// so decompression cannot fail here.
fn p1_of(bytes: &[u8; PUBLIC_KEY_SIZE]) -> blst_p1 {
    let mut affine = blst_p1_affine::default();
    let mut point = blst_p1::default();
    unsafe {
        blst_p1_uncompress(&mut affine, bytes.as_ptr());
        blst_p1_from_affine(&mut point, &affine);
    }
    point
}

fn compress_p1(point: &blst_p1) -> [u8; PUBLIC_KEY_SIZE] {
    let mut bytes = [0u8; PUBLIC_KEY_SIZE];
    unsafe { blst_p1_compress(bytes.as_mut_ptr(), point) };
    bytes
}

fn p2_of(bytes: &[u8; SIGNATURE_SIZE]) -> blst_p2 {
    let mut affine = blst_p2_affine::default();
    let mut point = blst_p2::default();
    unsafe {
        blst_p2_uncompress(&mut affine, bytes.as_ptr());
        blst_p2_from_affine(&mut point, &affine);
    }
    point
}

fn compress_p2(point: &blst_p2) -> [u8; SIGNATURE_SIZE] {
    let mut bytes = [0u8; SIGNATURE_SIZE];
    unsafe { blst_p2_compress(bytes.as_mut_ptr(), point) };
    bytes
}

fn hash_to_g2(msg: &[u8]) -> blst_p2 {
    let mut msg_hash = blst_p2::default();
    let aug = b"";
    unsafe {
        blst_hash_to_g2(
            &mut msg_hash,
            msg.as_ptr(),
            msg.len(),
            AUG_DST.as_ptr(),
            AUG_DST.len(),
            aug.as_ptr(),
            aug.len(),
        )
    };
    msg_hash
}

/// A scalar modulo the BLS12-381 group order, usable as a secret key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecretScalar([u8; SCALAR_SIZE]);

impl SecretScalar {
    pub fn zero() -> Self {
        Self([0u8; SCALAR_SIZE])
    }

    /// Parses a canonical 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SCALAR_SIZE] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidBytes("secret scalar"))?;
        if !unsafe { blst_scalar_fr_check(&blst_scalar_of(&bytes)) } {
            return Err(KeyError::InvalidBytes("secret scalar"));
        }
        Ok(Self(bytes))
    }

    /// Interprets `bytes` as an unsigned big-endian integer, reduced modulo
    /// the group order.
    pub fn from_be_bytes_reduced(bytes: &[u8]) -> Self {
        Self(reduce(bytes))
    }

    /// sha256 of the seed, reduced modulo the group order.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self::from_be_bytes_reduced(&sha256(&[seed]))
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_SIZE] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn public_key(&self) -> PublicPoint {
        if self.is_zero() {
            return PublicPoint::identity();
        }
        let mut point = blst_p1::default();
        unsafe { blst_sk_to_pk_in_g1(&mut point, &blst_scalar_of(&self.0)) };
        PublicPoint(compress_p1(&point))
    }

    pub fn fingerprint(&self) -> u32 {
        self.public_key().fingerprint()
    }

    /// Signs `msg` augmented with `final_public_key`, or with this key's own
    /// public key when none is given.
    pub fn sign(&self, msg: &[u8], final_public_key: Option<&PublicPoint>) -> Signature {
        if self.is_zero() {
            return Signature::identity();
        }
        let prefix = match final_public_key {
            Some(pk) => *pk,
            None => self.public_key(),
        };
        let msg_hash = hash_to_g2(&[prefix.as_bytes(), msg].concat());
        let mut sig = blst_p2::default();
        unsafe { blst_sign_pk_in_g1(&mut sig, &msg_hash, &blst_scalar_of(&self.0)) };
        Signature(compress_p2(&sig))
    }

    /// Unhardened child: the parent plus the derivation nonce of its public key.
    pub fn child(&self, index: u32) -> Self {
        *self + self.public_key().derivation_nonce(index)
    }

    pub fn child_for_path(&self, path: &[u32]) -> Self {
        path.iter().fold(*self, |sk, index| sk.child(*index))
    }

    /// Hardened (EIP-2333) child. A zero scalar has none.
    pub fn hardened_child(&self, index: u32) -> Result<Self, KeyError> {
        if self.is_zero() {
            return Err(KeyError::ZeroScalar);
        }
        let mut child = blst_scalar::default();
        unsafe { blst_derive_child_eip2333(&mut child, &blst_scalar_of(&self.0), index) };
        Ok(Self(bendian_of(&child)))
    }
}

impl Add for SecretScalar {
    type Output = SecretScalar;

    fn add(self, rhs: Self) -> Self {
        let mut sum = blst_fr::default();
        unsafe { blst_fr_add(&mut sum, &fr_of(&self.0), &fr_of(&rhs.0)) };
        Self(bendian_of_fr(&sum))
    }
}

impl Sum for SecretScalar {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |a, b| a + b)
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<prv for:{:08x}>", self.fingerprint())
    }
}

/// A point of G1, used as a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicPoint([u8; PUBLIC_KEY_SIZE]);

impl PublicPoint {
    /// The point at infinity, public key of the zero scalar.
    pub fn identity() -> Self {
        Self(infinity())
    }

    pub fn generator() -> Self {
        let mut point = blst_p1::default();
        unsafe { blst_p1_from_affine(&mut point, &BLS12_381_G1) };
        Self(compress_p1(&point))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; PUBLIC_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidBytes("public key"))?;
        let mut affine = blst_p1_affine::default();
        unsafe {
            let err = blst_p1_uncompress(&mut affine, bytes.as_ptr());
            if err != BLST_ERROR::BLST_SUCCESS {
                return Err(err.into());
            }
            if !blst_p1_affine_in_g1(&affine) {
                return Err(BLST_ERROR::BLST_POINT_NOT_IN_GROUP.into());
            }
        }
        Ok(Self(bytes))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0 == infinity()
    }

    pub fn fingerprint(&self) -> u32 {
        fingerprint_of(&self.0)
    }

    fn derivation_nonce(&self, index: u32) -> SecretScalar {
        SecretScalar::from_be_bytes_reduced(&sha256(&[&self.0[..], &index.to_be_bytes()[..]]))
    }

    /// Unhardened child, computable without the secret.
    pub fn child(&self, index: u32) -> Self {
        *self + self.derivation_nonce(index).public_key()
    }

    pub fn child_for_path(&self, path: &[u32]) -> Self {
        path.iter().fold(*self, |pk, index| pk.child(*index))
    }
}

impl Add for PublicPoint {
    type Output = PublicPoint;

    fn add(self, rhs: Self) -> Self {
        let mut sum = p1_of(&self.0);
        unsafe { blst_p1_add_or_double(&mut sum, &sum, &p1_of(&rhs.0)) };
        Self(compress_p1(&sum))
    }
}

impl Sum for PublicPoint {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::identity(), |a, b| a + b)
    }
}

impl fmt::Display for PublicPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PublicPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<PublicPoint: {self}>")
    }
}

/// A point of G2.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Default for Signature {
    fn default() -> Self {
        Self::identity()
    }
}

impl Signature {
    pub fn identity() -> Self {
        Self(infinity())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_SIZE] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidBytes("signature"))?;
        let mut affine = blst_p2_affine::default();
        unsafe {
            let err = blst_p2_uncompress(&mut affine, bytes.as_ptr());
            if err != BLST_ERROR::BLST_SUCCESS {
                return Err(err.into());
            }
            if !blst_p2_affine_in_g2(&affine) {
                return Err(BLST_ERROR::BLST_POINT_NOT_IN_GROUP.into());
            }
        }
        Ok(Self(bytes))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0 == infinity()
    }

    /// Checks this signature against `(public key, message)` pairs, each
    /// message augmented with its public key.
    ///
    /// Pairs under the identity key contribute nothing. With no remaining
    /// pairs, only the identity signature verifies.
    pub fn aggregate_verify<'a, I>(&self, pairs: I) -> bool
    where
        I: IntoIterator<Item = (&'a PublicPoint, &'a [u8])>,
    {
        let mut acc = None;
        for (pk, msg) in pairs {
            if pk.is_identity() {
                continue;
            }
            let msg_hash = hash_to_g2(&[pk.as_bytes(), msg].concat());
            accumulate(&mut acc, &p1_of(&pk.0), &msg_hash);
        }
        if !self.is_identity() {
            let mut neg_g1 = blst_p1::default();
            unsafe {
                blst_p1_from_affine(&mut neg_g1, &BLS12_381_G1);
                blst_p1_cneg(&mut neg_g1, true);
            }
            accumulate(&mut acc, &neg_g1, &p2_of(&self.0));
        }
        match acc {
            None => true,
            Some(mut product) => unsafe {
                blst_final_exp(&mut product, &product);
                blst_fp12_is_one(&product)
            },
        }
    }

    pub fn verify(&self, public_key: &PublicPoint, msg: &[u8]) -> bool {
        self.aggregate_verify([(public_key, msg)])
    }
}

/// Multiplies the miller loop of `(p, q)` into `acc`.
fn accumulate(acc: &mut Option<blst_fp12>, p: &blst_p1, q: &blst_p2) {
    let mut pa = blst_p1_affine::default();
    let mut qa = blst_p2_affine::default();
    let mut ml = blst_fp12::default();
    unsafe {
        blst_p1_to_affine(&mut pa, p);
        blst_p2_to_affine(&mut qa, q);
        blst_miller_loop(&mut ml, &qa, &pa);
    }
    *acc = Some(match acc.take() {
        None => ml,
        Some(prev) => {
            let mut product = blst_fp12::default();
            unsafe { blst_fp12_mul(&mut product, &prev, &ml) };
            product
        }
    });
}

impl Add for Signature {
    type Output = Signature;

    fn add(self, rhs: Self) -> Self {
        let mut sum = p2_of(&self.0);
        unsafe { blst_p2_add_or_double(&mut sum, &sum, &p2_of(&rhs.0)) };
        Self(compress_p2(&sum))
    }
}

impl Sum for Signature {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.filter(|sig| !sig.is_identity())
            .fold(Self::identity(), |a, b| a + b)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Signature: {self}>")
    }
}

/// Offset committing a public key to a hidden puzzle: sha256 of the key and
/// the hash, read as a signed big-endian integer and reduced into the scalar
/// field.
pub fn calculate_synthetic_offset(
    public_key: &PublicPoint,
    hidden_puzzle_hash: &[u8; 32],
) -> SecretScalar {
    let digest = sha256(&[public_key.as_bytes(), &hidden_puzzle_hash[..]]);
    let unsigned = fr_of(&reduce(&digest));
    if digest[0] & 0x80 == 0 {
        return SecretScalar(bendian_of_fr(&unsigned));
    }
    let mut two_256 = [0u8; 33];
    two_256[0] = 1;
    let mut signed = blst_fr::default();
    unsafe { blst_fr_sub(&mut signed, &unsigned, &fr_of(&reduce(&two_256))) };
    SecretScalar(bendian_of_fr(&signed))
}
