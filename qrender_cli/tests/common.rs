use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn qrender_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("qrender"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

/// A block with the default markers.
#[allow(dead_code)]
pub fn block(language: &str, expression: &str, output: &str) -> String {
	format!(
		"%% render block: start\n```{language}\n{expression}\n```\n%%\n\n{output}\n\n%% render \
		 block: end %%"
	)
}
