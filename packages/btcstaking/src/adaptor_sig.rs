use crate::error::Error;
use crate::Result;

use k256::elliptic_curve::group::prime::PrimeCurveAffine;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::schnorr::{Signature as SchnorrSignature, SigningKey, VerifyingKey};
use k256::{
    elliptic_curve::{
        ops::{MulByGenerator, Reduce},
        point::{AffineCoordinates, DecompressPoint},
        Field, PrimeField,
    },
    AffinePoint, ProjectivePoint, Scalar, U256,
};
use sha2::{Digest, Sha256};

/// MODNSCALAR_SIZE is the size of a scalar on the secp256k1 curve
const MODNSCALAR_SIZE: usize = 32;

/// JACOBIAN_POINT_SIZE is the size of a point on the secp256k1 curve in
/// compressed form
const JACOBIAN_POINT_SIZE: usize = 33;

/// ADAPTOR_SIGNATURE_SIZE is the size of a Schnorr adaptor signature
/// It is in the form of (R, s, needsNegation) where `R` is a point,
/// `s` is a scalar, and `needsNegation` is a boolean value
pub const ADAPTOR_SIGNATURE_SIZE: usize = JACOBIAN_POINT_SIZE + MODNSCALAR_SIZE + 1;

const CHALLENGE_TAG: &[u8] = b"BIP0340/challenge";
const AUX_TAG: &[u8] = b"BIP0340/aux";
const NONCE_TAG: &[u8] = b"BIP0340/nonce";

/// A Schnorr adaptor signature `(R, s', needs_negation)`.
///
/// `R` is the final signature nonce (with even y), `s'` the encrypted scalar.
/// Adapting with the discrete log `t` of the encryption key `T` yields the
/// BIP340 signature `(R.x, s' + t)`, or `(R.x, s' - t)` when `needs_negation`
/// is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptorSignature {
    r: ProjectivePoint,
    s_hat: Scalar,
    needs_negation: bool,
}

// Adapted from https://github.com/RustCrypto/elliptic-curves/blob/520f67d26be1773bd600d05796cc26d797dd7182/k256/src/schnorr.rs#L181-L187
fn tagged_hash(tag: &[u8]) -> Sha256 {
    let tag_hash = Sha256::digest(tag);
    let mut digest = Sha256::new();
    // The hash is in sha256d, so we need to hash twice
    digest.update(tag_hash);
    digest.update(tag_hash);
    digest
}

fn challenge(r: &ProjectivePoint, p_bytes: &[u8], msg: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(
        &tagged_hash(CHALLENGE_TAG)
            .chain_update(r.to_affine().x())
            .chain_update(p_bytes)
            .chain_update(msg)
            .finalize(),
    )
}

fn is_y_odd(p: &ProjectivePoint) -> bool {
    p.to_affine().y_is_odd().into()
}

/// Returns the scalar whose public point has an even y coordinate
fn normalize_scalar(x: Scalar) -> Scalar {
    if is_y_odd(&ProjectivePoint::mul_by_generator(&x)) {
        -x
    } else {
        x
    }
}

pub fn bytes_to_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    if bytes.len() != 32 {
        return Err(Error::DecompressPointFailed {});
    }
    let r_option = AffinePoint::decompress(
        k256::FieldBytes::from_slice(bytes),
        k256::elliptic_curve::subtle::Choice::from(false as u8),
    );
    let r = Option::<AffinePoint>::from(r_option).ok_or(Error::DecompressPointFailed {})?;
    // Convert AffinePoint to ProjectivePoint
    Ok(ProjectivePoint::from(r))
}

impl AdaptorSignature {
    /// Encrypted-signs `msg` with `sk` under the encryption key `enc_key`.
    /// The nonce is derived deterministically from the key, the encryption
    /// key, the message and `aux_rand`, in the manner of BIP340.
    pub fn enc_sign(
        sk: &SigningKey,
        enc_key: &VerifyingKey,
        msg: [u8; 32],
        aux_rand: [u8; 32],
    ) -> Result<Self> {
        let d = normalize_scalar(**sk.as_nonzero_scalar());
        let p_bytes = sk.verifying_key().to_bytes();
        let t = bytes_to_point(enc_key.to_bytes().as_slice())?;

        let aux_hash = tagged_hash(AUX_TAG).chain_update(aux_rand).finalize();
        let mut masked = d.to_bytes();
        for (m, a) in masked.iter_mut().zip(aux_hash.iter()) {
            *m ^= a;
        }
        let k = <Scalar as Reduce<U256>>::reduce_bytes(
            &tagged_hash(NONCE_TAG)
                .chain_update(masked)
                .chain_update(p_bytes.as_slice())
                .chain_update(t.to_affine().to_encoded_point(true).as_bytes())
                .chain_update(msg)
                .finalize(),
        );
        if bool::from(k.is_zero()) {
            return Err(Error::ZeroNonce {});
        }

        // R = kG + T, negated together with k when it has an odd y
        let r = ProjectivePoint::mul_by_generator(&k) + t;
        if r.to_affine().is_identity().into() {
            return Err(Error::PointAtInfinity("R".to_string()));
        }
        let needs_negation = is_y_odd(&r);
        let (r, k) = if needs_negation { (-r, -k) } else { (r, k) };

        let e = challenge(&r, p_bytes.as_slice(), &msg);
        let s_hat = k + e * d;

        Ok(AdaptorSignature {
            r,
            s_hat,
            needs_negation,
        })
    }

    pub fn verify(
        &self,
        pub_key: &VerifyingKey,
        enc_key: &VerifyingKey,
        msg: [u8; 32],
    ) -> Result<()> {
        // Convert public keys to points
        let pk = pub_key.to_bytes();
        let p = bytes_to_point(pk.as_slice())?;
        let ek = enc_key.to_bytes();
        let t = bytes_to_point(ek.as_slice())?;

        // Calculate R' = R - T (or R + T if negation is needed)
        let r_hat = if self.needs_negation {
            self.r + t
        } else {
            self.r - t
        };
        // Convert R' to affine coordinates
        let r_hat = r_hat.to_affine();

        // Calculate e = tagged_hash("BIP0340/challenge", bytes(R) || bytes(P) || m)
        // mod n
        let e = challenge(&self.r, pk.as_slice(), &msg);

        // Calculate expected R' = s'*G - e*P
        let s_hat_g = ProjectivePoint::mul_by_generator(&self.s_hat);
        let e_p = p * e;
        let expected_r_hat = (s_hat_g - e_p).to_affine();

        // Ensure expected R' is not the point at infinity
        if expected_r_hat.is_identity().into() {
            return Err(Error::PointAtInfinity("expected R'".to_string()));
        }

        // Ensure R.y is even
        if is_y_odd(&self.r) {
            return Err(Error::PointWithOddY("R".to_string()));
        }

        // Ensure R' == expected R'
        if !r_hat.eq(&expected_r_hat) {
            return Err(Error::VerifyAdaptorSigFailed {});
        }

        Ok(())
    }

    /// Decrypts the adaptor signature with the secret `dec_key` of the
    /// encryption key, producing a valid BIP340 Schnorr signature.
    pub fn decrypt(&self, dec_key: &Scalar) -> Result<SchnorrSignature> {
        let t = normalize_scalar(*dec_key);
        let s = if self.needs_negation {
            self.s_hat - t
        } else {
            self.s_hat + t
        };

        let mut sig_bytes = [0u8; 64];
        sig_bytes[..32].copy_from_slice(&self.r.to_affine().x());
        sig_bytes[32..].copy_from_slice(&s.to_bytes());
        SchnorrSignature::try_from(sig_bytes.as_slice())
            .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))
    }

    /// Recovers the decryption key from the adaptor signature and the Schnorr
    /// signature obtained by decrypting it.
    pub fn extract(&self, sig: &SchnorrSignature, enc_key: &VerifyingKey) -> Result<Scalar> {
        let sig_bytes = sig.to_bytes();
        if sig_bytes[..32] != self.r.to_affine().x()[..] {
            return Err(Error::DecryptionKeyMismatch {});
        }
        let s = Option::<Scalar>::from(Scalar::from_repr(*k256::FieldBytes::from_slice(
            &sig_bytes[32..],
        )))
        .ok_or(Error::FailedToParseScalar {})?;

        let t = if self.needs_negation {
            self.s_hat - s
        } else {
            s - self.s_hat
        };
        let t = normalize_scalar(t);

        let expected_t = bytes_to_point(enc_key.to_bytes().as_slice())?;
        if ProjectivePoint::mul_by_generator(&t) != expected_t {
            return Err(Error::DecryptionKeyMismatch {});
        }
        Ok(t)
    }

    pub fn new(asig_bytes: &[u8]) -> Result<Self> {
        if asig_bytes.len() != ADAPTOR_SIGNATURE_SIZE {
            return Err(Error::MalformedAdaptorSignature(
                ADAPTOR_SIGNATURE_SIZE,
                asig_bytes.len(),
            ));
        }
        // get R
        if asig_bytes[0] != 0x02 && asig_bytes[0] != 0x03 {
            return Err(Error::InvalidAdaptorSignatureFirstByte(asig_bytes[0]));
        }
        let is_y_odd = asig_bytes[0] == 0x03;
        let r_option = AffinePoint::decompress(
            k256::FieldBytes::from_slice(&asig_bytes[1..JACOBIAN_POINT_SIZE]),
            k256::elliptic_curve::subtle::Choice::from(is_y_odd as u8),
        );
        let r: ProjectivePoint = Option::<AffinePoint>::from(r_option)
            .ok_or(Error::DecompressPointFailed {})?
            .into();

        // get s_hat
        let s_hat_bytes = &asig_bytes[JACOBIAN_POINT_SIZE..JACOBIAN_POINT_SIZE + MODNSCALAR_SIZE];
        let s_hat_field_bytes = *k256::FieldBytes::from_slice(s_hat_bytes);
        let s_hat =
            Scalar::from_repr_vartime(s_hat_field_bytes).ok_or(Error::FailedToParseScalar {})?;

        let needs_negation = asig_bytes[JACOBIAN_POINT_SIZE + MODNSCALAR_SIZE] == 0x01;
        Ok(AdaptorSignature {
            r,
            s_hat,
            needs_negation,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ADAPTOR_SIGNATURE_SIZE);
        bytes.extend_from_slice(self.r.to_affine().to_encoded_point(true).as_bytes());
        bytes.extend_from_slice(&self.s_hat.to_bytes());
        bytes.push(self.needs_negation as u8);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::schnorr::signature::hazmat::PrehashVerifier;

    fn signing_key(seed: u8) -> SigningKey {
        let bytes = Sha256::digest([seed]);
        SigningKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn enc_sign_verify_adapt_extract() {
        for seed in 0..16u8 {
            let signer = signing_key(seed);
            let enc_sk = signing_key(seed.wrapping_add(100));
            let enc_key = *enc_sk.verifying_key();
            let msg: [u8; 32] = Sha256::digest([seed, 1]).into();

            let asig = AdaptorSignature::enc_sign(&signer, &enc_key, msg, [seed; 32]).unwrap();
            asig.verify(signer.verifying_key(), &enc_key, msg).unwrap();

            // the encoding round-trips
            let decoded = AdaptorSignature::new(&asig.to_bytes()).unwrap();
            assert_eq!(decoded, asig);

            // adapting with the decryption key yields a valid BIP340 signature
            let sig = asig.decrypt(enc_sk.as_nonzero_scalar()).unwrap();
            signer.verifying_key().verify_prehash(&msg, &sig).unwrap();

            // and the decryption key can be extracted back
            let t = asig.extract(&sig, &enc_key).unwrap();
            assert_eq!(
                ProjectivePoint::mul_by_generator(&t),
                bytes_to_point(enc_key.to_bytes().as_slice()).unwrap()
            );
        }
    }

    #[test]
    fn verify_rejects_wrong_message_and_key() {
        let signer = signing_key(1);
        let enc_key = *signing_key(2).verifying_key();
        let other = *signing_key(3).verifying_key();
        let msg = [7u8; 32];

        let asig = AdaptorSignature::enc_sign(&signer, &enc_key, msg, [0u8; 32]).unwrap();
        assert_eq!(
            asig.verify(signer.verifying_key(), &enc_key, [8u8; 32]),
            Err(Error::VerifyAdaptorSigFailed {})
        );
        assert_eq!(
            asig.verify(signer.verifying_key(), &other, msg),
            Err(Error::VerifyAdaptorSigFailed {})
        );
        assert_eq!(
            asig.verify(&other, &enc_key, msg),
            Err(Error::VerifyAdaptorSigFailed {})
        );
    }

    #[test]
    fn decrypt_with_wrong_key_does_not_verify() {
        let signer = signing_key(4);
        let enc_key = *signing_key(5).verifying_key();
        let msg = [9u8; 32];

        let asig = AdaptorSignature::enc_sign(&signer, &enc_key, msg, [0u8; 32]).unwrap();
        let sig = asig.decrypt(signing_key(6).as_nonzero_scalar()).unwrap();
        assert!(signer.verifying_key().verify_prehash(&msg, &sig).is_err());
        assert_eq!(
            asig.extract(&sig, &enc_key),
            Err(Error::DecryptionKeyMismatch {})
        );
    }

    #[test]
    fn new_rejects_malformed_bytes() {
        assert_eq!(
            AdaptorSignature::new(&[0u8; 10]),
            Err(Error::MalformedAdaptorSignature(ADAPTOR_SIGNATURE_SIZE, 10))
        );
        let mut bytes = [0u8; ADAPTOR_SIGNATURE_SIZE];
        bytes[0] = 0x04;
        assert_eq!(
            AdaptorSignature::new(&bytes),
            Err(Error::InvalidAdaptorSignatureFirstByte(0x04))
        );
    }
}
