use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use kamado::engine::{self, EngineConfig, Precision};
use kamado::{Error, Predictor, Result};

/// Side of the square images the decoder produces.
pub const IMAGE_SIDE: usize = 8;

/// Stand-in for a latent diffusion decoder: turns a `[batch, LATENT_DIM]`
/// latent tensor into `[batch, IMAGE_SIDE, IMAGE_SIDE, 3]` u8 images.
pub struct Decoder {
    name: String,
    device: Device,
    dtype: DType,
}

impl Decoder {
    pub fn new(name: &str, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            device: candle_device(config.device)?,
            dtype: match config.precision {
                Precision::Fp32 => DType::F32,
                Precision::Fp16 => DType::F16,
                Precision::Bf16 => DType::BF16,
            },
        })
    }
}

fn decode(latents: &Tensor, device: &Device, dtype: DType) -> candle_core::Result<Tensor> {
    let batch = latents.dims()[0];
    let brightness = latents
        .to_device(device)?
        .to_dtype(dtype)?
        .to_dtype(DType::F32)?
        .mean_keepdim(1)?
        .affine(127.5, 127.5)?
        .clamp(0f32, 255f32)?;
    brightness
        .broadcast_as((batch, IMAGE_SIDE * IMAGE_SIDE * 3))?
        .contiguous()?
        .to_dtype(DType::U8)?
        .reshape((batch, IMAGE_SIDE, IMAGE_SIDE, 3))
}

fn candle_device(device: engine::Device) -> Result<Device> {
    let mapped = match device {
        engine::Device::Cpu => Ok(Device::Cpu),
        engine::Device::Cuda { device_id } => Device::new_cuda(device_id as usize),
        engine::Device::Rocm { .. } => return Err(Error::Config("candle has no ROCm backend".into())),
    };
    mapped.map_err(|e| Error::Config(e.to_string()))
}

#[async_trait]
impl Predictor<Tensor> for Decoder {
    type Output = Tensor;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn predict(&self, inputs: &Tensor) -> Result<Tensor> {
        let (latents, device, dtype) = (inputs.clone(), self.device.clone(), self.dtype);
        tokio::task::spawn_blocking(move || decode(&latents, &device, dtype))
            .await
            .map_err(|e| Error::Predict(e.to_string()))?
            .map_err(|e| Error::Predict(e.to_string()))
    }
}
