use app::anyhow::Result;
use gui::imgui::Ui;

/// Shown and logged for M, which has no sound to toggle.
pub const NO_AUDIO: &str = "ignored, no audio in this build";

const KEY_BINDINGS: [(&str, &str); 6] = [
    ("A", "spin the statue and panels"),
    ("W", "frame the text panel"),
    ("P", "post-process effects"),
    ("R", "cycle frame statistics"),
    ("M", NO_AUDIO),
    ("1-3", "print the flag for another backend"),
];

/// Toggle states shown next to the key help. The app pushes them after handling keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gui {
    pub spinning: bool,
    pub text_framed: bool,
    pub postprocess: bool,
}

impl Gui {
    fn status_lines(&self) -> Vec<String> {
        let on_off = |on: bool| if on { "on" } else { "off" };
        vec![
            format!("Spin: {}", on_off(self.spinning)),
            format!("Frame: {}", on_off(self.text_framed)),
            format!("Post-process: {}", on_off(self.postprocess)),
        ]
    }
}

impl app::Gui for Gui {
    fn new() -> Result<Self> {
        Ok(Self::default())
    }

    fn build(&mut self, ui: &Ui) {
        let [_, height] = ui.io().display_size;
        gui::key_help_panel(ui, [10.0, height - 140.0], &KEY_BINDINGS);
        gui::text_panel(ui, "Toggles", [220.0, height - 80.0], &self.status_lines());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sound_key_is_documented_as_ignored() {
        let (_, action) = KEY_BINDINGS
            .iter()
            .find(|(key, _)| *key == "M")
            .copied()
            .unwrap();
        assert_eq!(action, NO_AUDIO);
        assert!(action.contains("no audio"));
    }

    #[test]
    fn status_follows_toggles() {
        let gui = Gui {
            postprocess: true,
            ..Default::default()
        };
        assert_eq!(
            gui.status_lines(),
            ["Spin: off", "Frame: off", "Post-process: on"]
        );
    }
}
