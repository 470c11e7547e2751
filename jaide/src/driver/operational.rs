//! Operational-mode and shell commands.

use log::debug;

use super::OutputFormat;
use crate::error::{Error, Result, RpcError};
use crate::session::{DeviceHandle, ShellMode};
use crate::xml;

/// Separates a command from an inline extraction expression.
const EXTRACTION_DELIMITER: char = '%';

/// Split `show interfaces % //physical-interface/name` into the command and
/// its extraction expression.
pub fn split_extraction(input: &str) -> (&str, Option<&str>) {
    match input.split_once(EXTRACTION_DELIMITER) {
        Some((command, expression)) => {
            let expression = expression.trim();
            (
                command.trim(),
                (!expression.is_empty()).then_some(expression),
            )
        }
        None => (input.trim(), None),
    }
}

/// The command line actually sent for an operational command.
fn wire_command(command: &str, format: OutputFormat, extracting: bool) -> String {
    let mut line = command.to_string();
    if format == OutputFormat::Xml || extracting {
        line.push_str(" | display xml");
    }
    line.push_str(" | no-more");
    line
}

/// Drop the echoed command line and `trailing` prompt lines from terminal
/// output.
pub(crate) fn strip_terminal(raw: &str, trailing: usize) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    if lines.len() <= 1 + trailing {
        return String::new();
    }
    lines[1..lines.len() - trailing].join("\n")
}

/// Apply an extraction expression to an XML document embedded in CLI output.
///
/// Matches are re-serialised; no match yields an empty string.
pub(crate) fn extract(output: &str, expression: &str) -> Result<String> {
    let document = match (output.find('<'), output.rfind('>')) {
        (Some(start), Some(end)) if start < end => &output[start..=end],
        _ => return Err(RpcError::Xml("no XML document in command output".to_string()).into()),
    };
    let tree = xml::parse(document)?;
    let matches = tree.query(expression)?;
    Ok(matches
        .iter()
        .map(|element| element.to_xml_string())
        .collect())
}

impl DeviceHandle {
    /// Run one operational-mode command.
    ///
    /// Paging is always disabled. With `OutputFormat::Xml` or an extraction
    /// expression the device is asked for XML; the expression then filters
    /// the reply. Accounts that land in the raw shell run the command from
    /// the CLI of an interactive shell, everyone else over an exec channel.
    pub async fn op_cmd(
        &mut self,
        command: &str,
        format: OutputFormat,
        xpath: Option<&str>,
    ) -> Result<String> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::invalid_command("Parameter 'command' cannot be empty"));
        }
        let line = wire_command(command, format, xpath.is_some());
        debug!("{}: op command {:?}", self.host(), line);

        let output = if self.is_root_login() {
            let first_byte = self.session_timeout();
            let idle = self.timing().idle;
            let shell = self.shell_session(ShellMode::Cli).await?;
            shell.send(&format!("{line}\n")).await?;
            let raw = shell.read_until_idle(first_byte, idle).await?;
            strip_terminal(&raw, 2)
        } else {
            self.exec_session().await?.exec(&line).await?.combined()
        };

        match xpath {
            Some(expression) => extract(&output, expression),
            None => Ok(output),
        }
    }

    /// Run one command in the device's raw OS shell.
    ///
    /// Output is collected until the shell goes quiet; the echoed command and
    /// the trailing prompt are removed.
    pub async fn shell_cmd(&mut self, command: &str) -> Result<String> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::invalid_command(
                "Parameter 'command' must not be empty.",
            ));
        }
        let first_byte = self.session_timeout();
        let idle = self.timing().idle;
        let shell = self.shell_session(ShellMode::Shell).await?;
        shell.send(&format!("{command}\n")).await?;
        let raw = shell.read_until_idle(first_byte, idle).await?;
        Ok(strip_terminal(&raw, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_split_extraction() {
        assert_eq!(
            split_extraction("show interfaces terse % //physical-interface/name"),
            ("show interfaces terse", Some("//physical-interface/name"))
        );
        assert_eq!(split_extraction(" show version "), ("show version", None));
        assert_eq!(split_extraction("show version %  "), ("show version", None));
    }

    #[test]
    fn test_wire_command() {
        assert_eq!(
            wire_command("show version", OutputFormat::Text, false),
            "show version | no-more"
        );
        assert_eq!(
            wire_command("show version", OutputFormat::Xml, false),
            "show version | display xml | no-more"
        );
        assert_eq!(
            wire_command("show route", OutputFormat::Text, true),
            "show route | display xml | no-more"
        );
    }

    #[test]
    fn test_strip_terminal() {
        let raw = "uptime\n10:02AM  up 3 days, 2 users\nroot@r1:RE:0% ";
        assert_eq!(strip_terminal(raw, 1), "10:02AM  up 3 days, 2 users");

        let cli = "show version | no-more\nHostname: r1\nModel: mx204\n\nroot@r1> ";
        assert_eq!(strip_terminal(cli, 2), "Hostname: r1\nModel: mx204");

        assert_eq!(strip_terminal("only-echo", 1), "");
    }

    #[test]
    fn test_extract_strips_namespaces() {
        let output = r#"
<rpc-reply xmlns:junos="http://xml.juniper.net/junos/23.4R1/junos">
    <software-information>
        <host-name>edge-r1</host-name>
        <product-model>mx204</product-model>
    </software-information>
    <cli>
        <banner></banner>
    </cli>
</rpc-reply>
"#;
        assert_eq!(
            extract(output, "//host-name").unwrap(),
            "<host-name>edge-r1</host-name>\n"
        );
        assert_eq!(extract(output, "//serial-number").unwrap(), "");
    }

    #[test]
    fn test_extract_without_xml() {
        let err = extract("error: syntax error, expecting <command>: foo", "//x").unwrap_err();
        assert!(matches!(err, Error::Rpc(RpcError::Xml(_))));

        let err = extract("plain text", "//x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Operation);
    }
}
