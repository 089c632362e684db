//! Stage selection as a value, not emergent control flow.
//!
//! Redesign note in `spec.md` §9: "Dynamic request shape → stage DAG...
//! Reimplementation should use a tagged-variant request or an explicit
//! boolean computation that yields an execution plan before any stage
//! runs." [`ExecutionPlan::select`] is that computation; the engine
//! switches on the resulting plan rather than re-inspecting the request.

use crate::request::PipelineRequest;

/// The set of stages a request will run, computed once from the rule
/// table in `spec.md` §4.3 before the engine starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Neither a script nor a lip-sync target/source was given.
    Rejected,
    /// `script_text` only: voice synthesis is the entire pipeline.
    AudioOnly,
    /// Lip-sync only, no face swap.
    LipSyncOnly,
    /// Lip-sync followed by face swap.
    LipSyncThenFaceSwap,
    /// Voice synthesis, then lip-sync, no face swap.
    VoiceThenLipSync,
    /// Voice synthesis, then lip-sync, then face swap.
    VoiceThenLipSyncThenFaceSwap,
}

impl ExecutionPlan {
    pub fn select(request: &PipelineRequest) -> Self {
        let has_script = !request.script_text_trimmed().is_empty();
        let has_target = request.has_lip_sync_target();
        let has_sources = request.has_face_swap_sources();

        match (has_script, has_target) {
            (false, false) => ExecutionPlan::Rejected,
            (true, false) => ExecutionPlan::AudioOnly,
            (false, true) if has_sources => ExecutionPlan::LipSyncThenFaceSwap,
            (false, true) => ExecutionPlan::LipSyncOnly,
            (true, true) if has_sources => ExecutionPlan::VoiceThenLipSyncThenFaceSwap,
            (true, true) => ExecutionPlan::VoiceThenLipSync,
        }
    }

    pub fn runs_voice_stage(self) -> bool {
        matches!(
            self,
            ExecutionPlan::AudioOnly
                | ExecutionPlan::VoiceThenLipSync
                | ExecutionPlan::VoiceThenLipSyncThenFaceSwap
        )
    }

    pub fn runs_lip_sync_stage(self) -> bool {
        matches!(
            self,
            ExecutionPlan::LipSyncOnly
                | ExecutionPlan::LipSyncThenFaceSwap
                | ExecutionPlan::VoiceThenLipSync
                | ExecutionPlan::VoiceThenLipSyncThenFaceSwap
        )
    }

    pub fn runs_face_swap_stage(self) -> bool {
        matches!(
            self,
            ExecutionPlan::LipSyncThenFaceSwap | ExecutionPlan::VoiceThenLipSyncThenFaceSwap
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(script: Option<&str>, target: Option<&str>, sources: Vec<&str>) -> PipelineRequest {
        PipelineRequest {
            script_text: script.map(str::to_string),
            target_key: target.map(str::to_string),
            source_keys: sources.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_when_nothing_given() {
        assert_eq!(
            ExecutionPlan::select(&req(None, None, vec![])),
            ExecutionPlan::Rejected
        );
    }

    #[test]
    fn audio_only_for_script_without_target() {
        assert_eq!(
            ExecutionPlan::select(&req(Some("hi"), None, vec![])),
            ExecutionPlan::AudioOnly
        );
    }

    #[test]
    fn whitespace_only_script_does_not_count() {
        assert_eq!(
            ExecutionPlan::select(&req(Some("   "), None, vec![])),
            ExecutionPlan::Rejected
        );
    }

    #[test]
    fn lip_sync_only_for_target_without_sources() {
        assert_eq!(
            ExecutionPlan::select(&req(None, Some("v.mp4"), vec![])),
            ExecutionPlan::LipSyncOnly
        );
    }

    #[test]
    fn full_chain_for_script_target_and_sources() {
        assert_eq!(
            ExecutionPlan::select(&req(Some("hi"), Some("v.mp4"), vec!["f.png"])),
            ExecutionPlan::VoiceThenLipSyncThenFaceSwap
        );
    }

    #[test]
    fn sources_alone_counts_as_a_lip_sync_target() {
        assert_eq!(
            ExecutionPlan::select(&req(None, None, vec!["f.png"])),
            ExecutionPlan::LipSyncThenFaceSwap
        );
    }
}
