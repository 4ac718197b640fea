use crate::error::Error;
use crate::Result;

use k256::{
    elliptic_curve::{
        ops::{MulByGenerator, Reduce},
        point::{AffineCoordinates, DecompressPoint},
        subtle::Choice,
        Field, PrimeField,
    },
    AffinePoint, ProjectivePoint, Scalar, U256,
};
use sha2::{Digest, Sha256};
use std::ops::Mul;

const CHALLENGE_TAG: &[u8] = b"BIP0340/challenge";

// adapted from https://github.com/RustCrypto/elliptic-curves/blob/520f67d26be1773bd600d05796cc26d797dd7182/k256/src/schnorr.rs#L181-L187
fn tagged_hash(tag: &[u8]) -> Sha256 {
    let tag_hash = Sha256::digest(tag);
    let mut digest = Sha256::new();
    // the hash is in sha256d so we need to hash twice
    digest.update(tag_hash);
    digest.update(tag_hash);
    digest
}

/// BIP340 challenge `H(R.x || P.x || m)` reduced mod n
fn challenge(r_bytes: &[u8; 32], p_bytes: &[u8; 32], msg_hash: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(
        &tagged_hash(CHALLENGE_TAG)
            .chain_update(r_bytes)
            .chain_update(p_bytes)
            .chain_update(msg_hash)
            .finalize(),
    )
}

fn point_to_bytes(p: &ProjectivePoint) -> [u8; 32] {
    p.to_affine().x().into()
}

fn has_odd_y(p: &ProjectivePoint) -> bool {
    p.to_affine().y_is_odd().into()
}

/// Lifts an x coordinate to the point with even y coordinate
fn lift_x(x_bytes: &[u8; 32]) -> Option<ProjectivePoint> {
    let x = k256::FieldBytes::from(*x_bytes);
    let ap = AffinePoint::decompress(&x, Choice::from(0));
    Option::<AffinePoint>::from(ap).map(ProjectivePoint::from)
}

/// SecRand is the type for a secret randomness
/// It is formed as a scalar on the Secp256k1 curve
pub type SecRand = Scalar;

/// new_sec_rand parses the given bytes into a new secret randomness
/// the given byte slice has to be a 32-byte scalar
pub fn new_sec_rand(r: &[u8]) -> Result<SecRand> {
    let array: [u8; 32] = r
        .try_into()
        .map_err(|_| Error::InvalidInputLength(r.len()))?;
    let sr = SecRand::from_repr_vartime(array.into()).ok_or(Error::SecretRandomnessParseFailed {})?;
    if bool::from(sr.is_zero()) {
        return Err(Error::SecretRandomnessParseFailed {});
    }
    Ok(sr)
}

/// PubRand is the type for a public randomness
/// It is formed as a point with even y coord on the Secp256k1 curve
pub type PubRand = ProjectivePoint;

/// new_pub_rand parses the given bytes into a new public randomness
/// the given byte slice has to be 32-byte representation of an x coordinate
/// on secp256k1 curve
pub fn new_pub_rand(x_bytes: &[u8]) -> Result<PubRand> {
    let array: [u8; 32] = x_bytes
        .try_into()
        .map_err(|_| Error::InvalidInputLength(x_bytes.len()))?;
    lift_x(&array).ok_or(Error::PublicRandomnessParseFailed {})
}

/// pub_rand_from_sec_rand derives the public randomness committed for the
/// given secret randomness
pub fn pub_rand_from_sec_rand(sec_rand: &SecRand) -> PubRand {
    ProjectivePoint::mul_by_generator(sec_rand)
}

/// pub_rand_to_bytes serializes a public randomness as its x-only coordinate
pub fn pub_rand_to_bytes(pub_rand: &PubRand) -> [u8; 32] {
    point_to_bytes(pub_rand)
}

/// Signature is an extractable one-time signature (EOTS)
/// i.e., s in a Schnorr signature (R, s)
pub type Signature = Scalar;

pub fn new_sig(r: &[u8]) -> Result<Signature> {
    let array: [u8; 32] = r
        .try_into()
        .map_err(|_| Error::InvalidInputLength(r.len()))?;
    Signature::from_repr_vartime(array.into()).ok_or(Error::SignatureParseFailed {})
}

pub fn sig_to_bytes(sig: &Signature) -> [u8; 32] {
    sig.to_bytes().into()
}

/// SecretKey is a secret key, formed as a 32-byte scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    inner: k256::SecretKey,
}

/// PublicKey is a public key, formed as a point with even coordinate
/// on the Secp256k1 curve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: k256::PublicKey,
}

impl SecretKey {
    pub fn from_bytes(x: [u8; 32]) -> Result<Self> {
        let sk = k256::SecretKey::from_bytes(&x.into()).map_err(|_| Error::SecretKeyParseFailed {})?;
        Ok(SecretKey { inner: sk })
    }

    pub fn from_hex(x_hex: &str) -> Result<Self> {
        let x_slice = hex::decode(x_hex)?;
        let len = x_slice.len();
        let x: [u8; 32] = x_slice
            .try_into()
            .map_err(|_| Error::InvalidInputLength(len))?;

        SecretKey::from_bytes(x)
    }

    /// pubkey gets the x-only public key corresponding to the secret key
    pub fn pubkey(&self) -> PublicKey {
        let p = self.inner.public_key().to_projective();
        let p = if has_odd_y(&p) { -p } else { p };
        // non-identity since the secret key is non-zero
        PublicKey {
            inner: k256::PublicKey::from_affine(p.to_affine()).unwrap_or(self.inner.public_key()),
        }
    }

    /// The scalar that signs under the even-y public key
    fn signing_scalar(&self) -> Scalar {
        let x = *self.inner.to_nonzero_scalar();
        let p = ProjectivePoint::mul_by_generator(&x);
        if has_odd_y(&p) {
            -x
        } else {
            x
        }
    }

    /// sign creates a signature with the given secret randomness
    /// and message hash
    pub fn sign(&self, sec_rand: &SecRand, msg_hash: &[u8; 32]) -> Signature {
        let x = self.signing_scalar();
        let p_bytes = point_to_bytes(&ProjectivePoint::mul_by_generator(&x));
        let r_point = ProjectivePoint::mul_by_generator(sec_rand);
        let r = if has_odd_y(&r_point) {
            -*sec_rand
        } else {
            *sec_rand
        };
        let c = challenge(&point_to_bytes(&r_point), &p_bytes, msg_hash);

        r + c * x
    }

    /// to_bytes converts the secret key into bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_bytes().to_vec()
    }

    /// to_scalar returns the secret scalar for the even-y public key
    pub fn to_scalar(&self) -> Scalar {
        self.signing_scalar()
    }
}

impl PublicKey {
    pub fn from_bytes(x_bytes: [u8; 32]) -> Result<Self> {
        let p = lift_x(&x_bytes).ok_or(Error::PublicKeyParseFailed {})?;
        let pk = k256::PublicKey::from_affine(p.to_affine())
            .map_err(|e| Error::EllipticCurveError(e.to_string()))?;
        Ok(PublicKey { inner: pk })
    }

    pub fn from_hex(p_hex: &str) -> Result<Self> {
        let p_slice = hex::decode(p_hex)?;
        let len = p_slice.len();
        let p: [u8; 32] = p_slice
            .try_into()
            .map_err(|_| Error::InvalidInputLength(len))?;

        PublicKey::from_bytes(p)
    }

    /// to_bytes converts the public key into its x-only bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        point_to_bytes(&self.inner.to_projective()).to_vec()
    }

    /// verify verifies whether the given signature w.r.t. the
    /// public key, public randomness and message hash
    pub fn verify(&self, pub_rand: &PubRand, msg_hash: &[u8; 32], sig: &Signature) -> bool {
        let p = self.inner.to_projective();
        let r_bytes = point_to_bytes(pub_rand);
        let c = challenge(&r_bytes, &point_to_bytes(&p), msg_hash);

        let recovered_r = ProjectivePoint::mul_by_generator(sig) - p.mul(c);
        if recovered_r == ProjectivePoint::IDENTITY || has_odd_y(&recovered_r) {
            return false;
        }
        point_to_bytes(&recovered_r) == r_bytes
    }
}

/// extract extracts the secret key from the public key, public
/// randomness, and two pairs of message hashes and signatures
pub fn extract(
    pk: &PublicKey,
    pub_rand: &PubRand,
    msg1: &[u8; 32],
    sig1: &Signature,
    msg2: &[u8; 32],
    sig2: &Signature,
) -> Result<SecretKey> {
    let p_bytes = point_to_bytes(&pk.inner.to_projective());
    let r_bytes = point_to_bytes(pub_rand);

    let e_delta = challenge(&r_bytes, &p_bytes, msg1) - challenge(&r_bytes, &p_bytes, msg2);
    let s_delta = sig1 - sig2;

    // (s1 - s2) / (e1 - e2)
    let inverted_e_delta =
        Option::<Scalar>::from(e_delta.invert()).ok_or(Error::SameMessage {})?;
    let sk = s_delta * inverted_e_delta;
    let sk = SecretKey::from_bytes(sk.to_bytes().into())?;

    if sk.pubkey().to_bytes() != p_bytes.to_vec() {
        return Err(Error::ExtractedKeyMismatch {});
    }
    Ok(sk)
}
