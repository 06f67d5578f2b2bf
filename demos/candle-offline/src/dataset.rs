use candle_core::{Device, Tensor};
use rand::{rngs::StdRng, Rng, SeedableRng};
use kamado::{Error, Result, ResultFormatter, RunState, SampleBatch, SampleResult, SampleSource};

pub const LATENT_DIM: usize = 16;

/// Preloaded prompts with one fixed latent each.
pub struct PromptSet {
    captions: Vec<String>,
    latents: Vec<Vec<f32>>,
}

impl PromptSet {
    pub fn generate(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let captions = (0..count).map(|i| format!("a photo of object {i}")).collect();
        let latents = (0..count)
            .map(|_| (0..LATENT_DIM).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
            .collect();
        Self { captions, latents }
    }
}

impl SampleSource for PromptSet {
    type Input = Tensor;
    type Label = Vec<String>;

    fn get_samples(&self, indices: &[usize]) -> Result<SampleBatch<Tensor, Vec<String>>> {
        let mut flat = Vec::with_capacity(indices.len() * LATENT_DIM);
        let mut labels = Vec::with_capacity(indices.len());
        for &index in indices {
            let latent = self
                .latents
                .get(index)
                .ok_or_else(|| Error::Source(format!("no prompt at index {index}")))?;
            flat.extend_from_slice(latent);
            labels.push(self.captions[index].clone());
        }
        let inputs = Tensor::from_vec(flat, (indices.len(), LATENT_DIM), &Device::Cpu)
            .map_err(|e| Error::Source(e.to_string()))?;
        Ok(SampleBatch::new(inputs, labels))
    }

    fn get_item_loc(&self, index: usize) -> String {
        match self.captions.get(index) {
            Some(caption) => format!("prompt[{index}] {caption:?}"),
            None => format!("prompt[{index}] <missing>"),
        }
    }

    fn item_count(&self) -> usize {
        self.captions.len()
    }
}

/// One raw RGB image per sample.
pub struct ImageBytes;

impl ResultFormatter<Tensor, Vec<String>, Tensor> for ImageBytes {
    fn format(
        &self,
        results: Tensor,
        sample_indices: &[usize],
        _batch: &SampleBatch<Tensor, Vec<String>>,
        _state: &RunState,
    ) -> Result<Vec<SampleResult>> {
        (0..sample_indices.len())
            .map(|row| {
                results
                    .get(row)
                    .and_then(|image| image.flatten_all())
                    .and_then(|image| image.to_vec1::<u8>())
                    .map(SampleResult::from)
                    .map_err(|e| Error::Format(e.to_string()))
            })
            .collect()
    }
}
