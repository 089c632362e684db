//! The immutable-by-default input to a pipeline task.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// SoVITS (voice synthesis) stage options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SovitsOptions {
    /// Inline transcript for the reference audio. Forced to empty and
    /// stripped from the outgoing payload by the engine regardless of
    /// what the caller sends — see `spec.md` §4.3.
    #[serde(default)]
    pub reference_text: Option<String>,
    #[serde(default = "default_sovits_output_prefix")]
    pub output_prefix: String,
    #[serde(default)]
    pub output_key: Option<String>,
    #[serde(default)]
    pub reference_text_key: Option<String>,
    #[serde(default = "default_ja")]
    pub ref_language: String,
    #[serde(default = "default_ja")]
    pub target_language: String,
    #[serde(default = "default_cut")]
    pub cut: String,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_sample_steps")]
    pub sample_steps: u32,
    #[serde(default = "default_pause_second")]
    pub pause_second: f64,
    #[serde(default)]
    pub with_prosody: bool,
    #[serde(default)]
    pub ref_text_free: bool,
}

fn default_sovits_output_prefix() -> String {
    "outputs/sovits".to_string()
}
fn default_ja() -> String {
    "ja".to_string()
}
fn default_cut() -> String {
    "punctuation".to_string()
}
fn default_top_p() -> f64 {
    1.0
}
fn default_temperature() -> f64 {
    1.0
}
fn default_speed() -> f64 {
    1.5
}
fn default_sample_steps() -> u32 {
    8
}
fn default_pause_second() -> f64 {
    0.3
}

impl Default for SovitsOptions {
    fn default() -> Self {
        Self {
            reference_text: None,
            output_prefix: default_sovits_output_prefix(),
            output_key: None,
            reference_text_key: None,
            ref_language: default_ja(),
            target_language: default_ja(),
            cut: default_cut(),
            top_p: default_top_p(),
            temperature: default_temperature(),
            speed: default_speed(),
            sample_steps: default_sample_steps(),
            pause_second: default_pause_second(),
            with_prosody: false,
            ref_text_free: false,
        }
    }
}

/// Wav2Lip (lip-sync) stage options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Wav2LipOptions {
    #[serde(default = "default_checkpoint")]
    pub checkpoint_path: String,
    #[serde(default = "default_enhancer")]
    pub enhancer: String,
    #[serde(default = "default_blending")]
    pub blending: u32,
    #[serde(default)]
    pub denoise: bool,
    #[serde(default)]
    pub face_mode: u32,
    #[serde(default)]
    pub pingpong: bool,
    #[serde(default)]
    pub fade: bool,
    #[serde(default)]
    pub frame_enhancer: bool,
    #[serde(default = "default_true")]
    pub face_mask: bool,
    #[serde(default)]
    pub face_occluder: bool,
    #[serde(default = "default_true")]
    pub skip_crop_gui: bool,
    #[serde(default = "default_true")]
    pub skip_face_selection: bool,
    #[serde(default = "default_wav2lip_output_prefix")]
    pub output_prefix: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_checkpoint() -> String {
    "checkpoints/wav2lip_gan.onnx".to_string()
}
fn default_enhancer() -> String {
    "auto".to_string()
}
fn default_blending() -> u32 {
    30
}
fn default_wav2lip_output_prefix() -> String {
    "outputs/wav2lip".to_string()
}

impl Default for Wav2LipOptions {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint(),
            enhancer: default_enhancer(),
            blending: default_blending(),
            denoise: false,
            face_mode: 0,
            pingpong: false,
            fade: false,
            frame_enhancer: false,
            face_mask: true,
            face_occluder: false,
            skip_crop_gui: true,
            skip_face_selection: true,
            output_prefix: default_wav2lip_output_prefix(),
            extra_args: Vec::new(),
        }
    }
}

/// FaceFusion (face-swap) stage options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FaceFusionOptions {
    #[serde(default = "default_processors")]
    pub processors: Vec<String>,
    #[serde(default = "default_face_swapper_model")]
    pub face_swapper_model: String,
    #[serde(default = "default_face_enhancer_model")]
    pub face_enhancer_model: String,
    #[serde(default = "default_blending")]
    pub face_enhancer_blend: u32,
    #[serde(default = "default_execution_providers")]
    pub execution_providers: Vec<String>,
    #[serde(default = "default_execution_thread_count")]
    pub execution_thread_count: u32,
    #[serde(default = "default_execution_queue_count")]
    pub execution_queue_count: u32,
}

fn default_processors() -> Vec<String> {
    vec!["face_swapper".to_string(), "face_enhancer".to_string()]
}
fn default_face_swapper_model() -> String {
    "inswapper_128_fp16".to_string()
}
fn default_face_enhancer_model() -> String {
    "gfpgan_1.4".to_string()
}
fn default_execution_providers() -> Vec<String> {
    vec!["cuda".to_string()]
}
fn default_execution_thread_count() -> u32 {
    4
}
fn default_execution_queue_count() -> u32 {
    1
}

impl Default for FaceFusionOptions {
    fn default() -> Self {
        Self {
            processors: default_processors(),
            face_swapper_model: default_face_swapper_model(),
            face_enhancer_model: default_face_enhancer_model(),
            face_enhancer_blend: default_blending(),
            execution_providers: default_execution_providers(),
            execution_thread_count: default_execution_thread_count(),
            execution_queue_count: default_execution_queue_count(),
        }
    }
}

/// Immutable-by-design input to a pipeline task (`spec.md` §3).
///
/// The engine is explicitly permitted to rewrite `audio_key` and
/// `audio_base64` after the voice-synthesis stage runs, since downstream
/// stages consume those fields — see `spec.md` §3's Ownership note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineRequest {
    #[serde(default)]
    pub source_keys: Vec<String>,
    #[serde(default)]
    pub target_key: Option<String>,
    #[serde(default)]
    pub audio_key: Option<String>,
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub reference_audio_key: Option<String>,
    #[serde(default)]
    pub script_text: Option<String>,
    #[serde(default)]
    pub output_key: Option<String>,
    #[serde(default)]
    pub wav2lip_output_key: Option<String>,
    #[serde(default)]
    pub sovits: SovitsOptions,
    #[serde(default)]
    pub wav2lip: Wav2LipOptions,
    #[serde(default)]
    pub facefusion: FaceFusionOptions,
    #[serde(default = "default_true")]
    pub retain_intermediate: bool,
}

impl Default for PipelineRequest {
    fn default() -> Self {
        Self {
            source_keys: Vec::new(),
            target_key: None,
            audio_key: None,
            audio_base64: None,
            reference_audio_key: None,
            script_text: None,
            output_key: None,
            wav2lip_output_key: None,
            sovits: SovitsOptions::default(),
            wav2lip: Wav2LipOptions::default(),
            facefusion: FaceFusionOptions::default(),
            retain_intermediate: true,
        }
    }
}

impl PipelineRequest {
    /// `script_text`, trimmed, or empty if absent/whitespace-only.
    pub fn script_text_trimmed(&self) -> &str {
        self.script_text.as_deref().unwrap_or("").trim()
    }

    /// The voice reference the SoVITS stage should use: `reference_audio_key`
    /// falls back to `audio_key`, per `original_source`'s
    /// `voice_key = reference_audio_key or audio_key` — see SPEC_FULL.md §9.
    pub fn voice_reference_key(&self) -> Option<&str> {
        self.reference_audio_key
            .as_deref()
            .or(self.audio_key.as_deref())
    }

    pub fn has_lip_sync_target(&self) -> bool {
        self.target_key.is_some() || !self.source_keys.is_empty()
    }

    pub fn has_face_swap_sources(&self) -> bool {
        !self.source_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let req = PipelineRequest::default();
        let value = serde_json::to_value(&req).unwrap();
        let back: PipelineRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back.retain_intermediate, req.retain_intermediate);
    }

    #[test]
    fn voice_reference_falls_back_to_audio_key() {
        let req = PipelineRequest {
            audio_key: Some("in/a.wav".into()),
            ..Default::default()
        };
        assert_eq!(req.voice_reference_key(), Some("in/a.wav"));
    }

    #[test]
    fn minimal_json_deserializes_with_defaults() {
        let req: PipelineRequest = serde_json::from_str("{}").unwrap();
        assert!(req.source_keys.is_empty());
        assert!(req.retain_intermediate);
    }
}
