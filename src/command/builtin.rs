use crate::command::executor::CommandHandler;
use crate::output::OutputSink;

/// Minimal handler used when no machine dispatcher is attached.
#[derive(Debug, Default, Clone)]
pub struct BuiltinCommands;

impl CommandHandler for BuiltinCommands {
    fn dispatch(&mut self, line: &str, out: &OutputSink) {
        let line = line.trim();
        let (cmd, params) = line.split_once(' ').unwrap_or((line, ""));

        match cmd {
            "" => {
                out.puts("ok\n");
            }
            "help" => {
                out.puts("help - list commands\n");
                out.puts("version - show firmware version\n");
                out.puts("echo text - print text\n");
            }
            "version" => {
                out.printf(format_args!(
                    "{} {}\n",
                    env!("CARGO_PKG_NAME"),
                    env!("CARGO_PKG_VERSION")
                ));
            }
            "echo" => {
                out.printf(format_args!("echo: {}\n", params.trim_start()));
            }
            _ if cmd.starts_with(';') || cmd.starts_with('(') => {
                out.puts("ok\n");
            }
            _ => {
                out.printf(format_args!("error:Unsupported command - {}\n", cmd));
            }
        }
    }
}
