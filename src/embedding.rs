// 🧭 Embedding Models - Fixed-length name vectors for the semantic tier
//
// Models are always passed in explicitly; nothing here is loaded globally.

use crate::error::EmbeddingError;

pub trait EmbeddingModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
    fn dimension(&self) -> usize;
}

/// Allow `Box<dyn EmbeddingModel>` wherever a model is expected
impl EmbeddingModel for Box<dyn EmbeddingModel> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Reject vectors whose length disagrees with the model's declared dimension
pub fn check_dimension(model: &dyn EmbeddingModel, vector: &[f32]) -> Result<(), EmbeddingError> {
    let expected = model.dimension();
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            got: vector.len(),
        });
    }
    Ok(())
}

// ============================================================================
// ONNX EMBEDDER - behind the `onnx-embeddings` feature
// ============================================================================

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::EmbeddingModel;
    use crate::error::EmbeddingError;
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Sentence-transformer inference through ONNX Runtime, mean-pooled and L2-normalized.
    ///
    /// The model directory holds `model.onnx` and `tokenizer.json` (a HuggingFace export,
    /// e.g. all-MiniLM-L6-v2). The session sits behind a Mutex since `Session::run`
    /// takes `&mut self`.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Hidden size of all-MiniLM-L6-v2
        pub const DEFAULT_DIMENSION: usize = 384;

        pub fn load(model_dir: &Path) -> Result<Self, EmbeddingError> {
            Self::load_with_dimension(model_dir, Self::DEFAULT_DIMENSION)
        }

        pub fn load_with_dimension(
            model_dir: &Path,
            dimension: usize,
        ) -> Result<Self, EmbeddingError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(EmbeddingError::ModelNotFound(model_path));
            }
            if !tokenizer_path.exists() {
                return Err(EmbeddingError::ModelNotFound(tokenizer_path));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| EmbeddingError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| EmbeddingError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| {
                    EmbeddingError::ModelInit(format!("ONNX load failed: {e}"))
                })?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| EmbeddingError::ModelInit(format!("tokenizer load failed: {e}")))?;

            tracing::info!(model_dir = %model_dir.display(), dimension, "loaded ONNX embedder");

            Ok(OnnxEmbedder {
                session: Mutex::new(session),
                tokenizer,
                dimension,
            })
        }

        fn infer(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> =
                encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let seq_len = input_ids.len();

            let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(model_error)?;
            let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(model_error)?;
            let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
                .map_err(model_error)?;

            let ids_tensor = TensorRef::from_array_view(&ids_array).map_err(model_error)?;
            let mask_tensor = TensorRef::from_array_view(&mask_array).map_err(model_error)?;
            let type_tensor = TensorRef::from_array_view(&type_array).map_err(model_error)?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| EmbeddingError::Model("session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| EmbeddingError::Model(format!("ONNX inference failed: {e}")))?;

            // [1, seq_len, dimension] token states
            let (shape, states) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| EmbeddingError::Model(format!("output extraction: {e}")))?;

            if shape.len() != 3 || shape[2] as usize != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    got: shape.last().map(|d| *d as usize).unwrap_or(0),
                });
            }

            // Mean pooling over attended tokens
            let mut pooled = vec![0.0f32; self.dimension];
            let mut mask_sum = 0.0f32;
            for (token, &mask) in attention_mask.iter().enumerate().take(seq_len) {
                let mask = mask as f32;
                mask_sum += mask;
                let offset = token * self.dimension;
                for (dim, p) in pooled.iter_mut().enumerate() {
                    *p += states[offset + dim] * mask;
                }
            }
            if mask_sum > 0.0 {
                for val in &mut pooled {
                    *val /= mask_sum;
                }
            }

            super::l2_normalize(&mut pooled);
            Ok(pooled)
        }
    }

    fn model_error(e: impl std::fmt::Display) -> EmbeddingError {
        EmbeddingError::Model(e.to_string())
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.infer(text)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

// ============================================================================
// HASHING EMBEDDER
// ============================================================================

/// Character-trigram feature hashing, L2-normalized.
///
/// Deterministic and offline: names sharing most trigrams land close together.
/// This is a lexical model, so it catches spelling variants but not synonyms
/// ("pre-med" vs "premedical"); build with `onnx-embeddings` for a real model.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    pub fn new(dimension: usize) -> Self {
        HashingEmbedder {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        HashingEmbedder::new(Self::DEFAULT_DIMENSION)
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimension];

        // Pad so first and last characters get their own trigrams
        let padded: Vec<char> = format!("  {} ", text.to_lowercase()).chars().collect();
        for gram in padded.windows(3) {
            let slot = (fnv1a(gram) % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    chars.iter().fold(OFFSET, |hash, c| {
        let mut buf = [0u8; 4];
        c.encode_utf8(&mut buf)
            .bytes()
            .fold(hash, |h, b| (h ^ b as u64).wrapping_mul(PRIME))
    })
}

/// Cosine similarity in [-1, 1]; 0 for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
