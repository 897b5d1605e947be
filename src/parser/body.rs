//! Line-by-line scan of a request body.
//!
//! Every line goes through the same rules in order: quoted lines are
//! skipped, markup is stripped, then package, split, `lang:` and `command:`
//! detection run independently of each other.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::RejectReason;
use crate::observe::{LocaleSource, RequestEvent, RequestObserver};

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));

// The greedy prefix makes the last directive on a line win.
static LANG_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*(?i:lang):\s+(.*)$").expect("valid lang regex"));

static COMMAND_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*(?i:command):\s+(.*)$").expect("valid command regex"));

/// What the body asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyFindings {
    /// First catalog package found, in body order.
    pub package: Option<String>,
    pub split_delivery: bool,
    /// Last `lang:` value, unvalidated.
    pub locale: Option<String>,
    /// Target of an authorized command.
    pub command_target: Option<String>,
}

/// A well-formed `Command:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub auth_token: &'a str,
    pub package: &'a str,
    pub target_address: &'a str,
}

/// Scans body lines against a fixed package list.
pub struct BodyScanner<'a> {
    packages: &'a [String],
    honor_lang: bool,
    sender: &'a str,
    observer: &'a dyn RequestObserver,
}

impl<'a> BodyScanner<'a> {
    /// `honor_lang` is false when the locale was already fixed by the
    /// recipient address. `sender` is reported with received commands.
    pub fn new(
        packages: &'a [String],
        honor_lang: bool,
        sender: &'a str,
        observer: &'a dyn RequestObserver,
    ) -> Self {
        Self {
            packages,
            honor_lang,
            sender,
            observer,
        }
    }

    /// Scan all lines once, in order, accumulating into `findings`.
    ///
    /// `authorize` decides whether a command may run. The first malformed or
    /// unauthorized command stops the scan; `findings` then holds what was
    /// found up to that line.
    pub fn scan<'l, I, F>(
        &self,
        lines: I,
        mut authorize: F,
        findings: &mut BodyFindings,
    ) -> Result<(), RejectReason>
    where
        I: IntoIterator<Item = &'l str>,
        F: FnMut(&CommandLine<'_>) -> Result<(), RejectReason>,
    {
        for line in lines {
            self.scan_line(line, &mut authorize, findings)?;
        }
        Ok(())
    }

    fn scan_line<F>(
        &self,
        line: &str,
        authorize: &mut F,
        findings: &mut BodyFindings,
    ) -> Result<(), RejectReason>
    where
        F: FnMut(&CommandLine<'_>) -> Result<(), RejectReason>,
    {
        if is_quoted(line) {
            return Ok(());
        }
        let line = strip_markup(line);

        if findings.package.is_none() {
            if let Some(package) = self.find_package(&line) {
                self.observer.observe(&RequestEvent::PackageRequested {
                    package: package.to_string(),
                });
                findings.package = Some(package.to_string());
            }
        }

        if line.contains("split") {
            if !findings.split_delivery {
                self.observer.observe(&RequestEvent::SplitDelivery);
            }
            findings.split_delivery = true;
        }

        if self.honor_lang {
            if let Some(caps) = LANG_DIRECTIVE.captures(&line) {
                let locale = caps[1].trim_end().to_string();
                self.observer.observe(&RequestEvent::LocaleRequested {
                    locale: locale.clone(),
                    source: LocaleSource::LangDirective,
                });
                findings.locale = Some(locale);
            }
        }

        if let Some(caps) = COMMAND_DIRECTIVE.captures(&line) {
            self.observer.observe(&RequestEvent::CommandReceived {
                from: self.sender.to_string(),
            });
            let command = parse_command(caps.get(1).map_or("", |m| m.as_str()))?;
            authorize(&command)?;
            findings.command_target = Some(command.target_address.to_string());
        }

        Ok(())
    }

    fn find_package(&self, line: &str) -> Option<&'a str> {
        self.packages
            .iter()
            .find(|name| line.contains(name.as_str()))
            .map(String::as_str)
    }
}

/// A line whose first non-space character is `>` is quoted reply text.
pub fn is_quoted(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

/// Remove every `<...>` tag from a line.
pub fn strip_markup(line: &str) -> Cow<'_, str> {
    MARKUP.replace_all(line, "")
}

/// Split the text after `command:` into exactly three tokens.
fn parse_command(args: &str) -> Result<CommandLine<'_>, RejectReason> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    match tokens[..] {
        [auth_token, package, target_address] => Ok(CommandLine {
            auth_token,
            package,
            target_address,
        }),
        _ => Err(RejectReason::MalformedCommand {
            token_count: tokens.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::testing::RecordingObserver;
    use crate::observe::NullObserver;

    fn packages() -> Vec<String> {
        ["source-bundle", "tor-browser-bundle", "windows-bundle"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn allow_all(_: &CommandLine<'_>) -> Result<(), RejectReason> {
        Ok(())
    }

    fn scan(body: &str, honor_lang: bool) -> Result<BodyFindings, RejectReason> {
        let pkgs = packages();
        let scanner = BodyScanner::new(&pkgs, honor_lang, "user@example.com", &NullObserver);
        let mut findings = BodyFindings::default();
        scanner.scan(body.lines(), allow_all, &mut findings)?;
        Ok(findings)
    }

    #[test]
    fn test_first_package_in_body_order_wins() {
        let f = scan("please send windows-bundle\nand source-bundle too\n", true).unwrap();
        assert_eq!(f.package.as_deref(), Some("windows-bundle"));
    }

    #[test]
    fn test_package_is_case_sensitive_substring() {
        let f = scan("I want the Windows-Bundle\nxxtor-browser-bundlexx\n", true).unwrap();
        assert_eq!(f.package.as_deref(), Some("tor-browser-bundle"));
    }

    #[test]
    fn test_no_package() {
        let f = scan("hello\nthere\n", true).unwrap();
        assert_eq!(f, BodyFindings::default());
    }

    #[test]
    fn test_split_anywhere() {
        let f = scan("source-bundle\nplease splitthis\n", true).unwrap();
        assert!(f.split_delivery);
        assert!(!scan("Split\n", true).unwrap().split_delivery);
    }

    #[test]
    fn test_markup_stripped_before_rules() {
        let f = scan("<p>sp<b>lit</b></p>\n<i>source</i>-bundle\n", true).unwrap();
        assert!(f.split_delivery);
        assert_eq!(f.package.as_deref(), Some("source-bundle"));
    }

    #[test]
    fn test_quoted_lines_ignored() {
        let body = "> windows-bundle split\n  > lang: de\n> command: a b c d\n";
        let f = scan(body, true).unwrap();
        assert_eq!(f, BodyFindings::default());
    }

    #[test]
    fn test_last_lang_wins() {
        let f = scan("lang: de\nLANG: fr  \nLang:\tru\n", true).unwrap();
        assert_eq!(f.locale.as_deref(), Some("ru"));
    }

    #[test]
    fn test_lang_needs_whitespace_after_colon() {
        let f = scan("lang:de\n", true).unwrap();
        assert_eq!(f.locale, None);
    }

    #[test]
    fn test_lang_ignored_when_not_honored() {
        let f = scan("lang: de\n", false).unwrap();
        assert_eq!(f.locale, None);
    }

    #[test]
    fn test_command_sets_target() {
        let f = scan("Command: goodtoken windows-bundle friend@example.org\n", true).unwrap();
        assert_eq!(f.command_target.as_deref(), Some("friend@example.org"));
        // The package token reaches the package rule through the same line.
        assert_eq!(f.package.as_deref(), Some("windows-bundle"));
    }

    #[test]
    fn test_command_wrong_token_count() {
        assert_eq!(
            scan("command: only two\n", true),
            Err(RejectReason::MalformedCommand { token_count: 2 })
        );
        assert_eq!(
            scan("COMMAND: a b c d\n", true),
            Err(RejectReason::MalformedCommand { token_count: 4 })
        );
    }

    #[test]
    fn test_unauthorized_command_keeps_earlier_findings() {
        let pkgs = packages();
        let scanner = BodyScanner::new(&pkgs, true, "eve@example.com", &NullObserver);
        let mut findings = BodyFindings::default();
        let result = scanner.scan(
            "source-bundle\nsplit\ncommand: bad x y@z.com\nwindows-bundle\n".lines(),
            |_: &CommandLine<'_>| {
                Err(RejectReason::UnauthorizedCommand {
                    from: "eve@example.com".to_string(),
                })
            },
            &mut findings,
        );
        assert!(matches!(
            result,
            Err(RejectReason::UnauthorizedCommand { .. })
        ));
        assert_eq!(findings.package.as_deref(), Some("source-bundle"));
        assert!(findings.split_delivery);
        assert_eq!(findings.command_target, None);
    }

    #[test]
    fn test_authorizer_sees_tokens() {
        let pkgs = packages();
        let scanner = BodyScanner::new(&pkgs, true, "user@example.com", &NullObserver);
        let mut seen = Vec::new();
        let mut findings = BodyFindings::default();
        scanner
            .scan(
                ["command:  tok   pkg   to@example.org  "],
                |cmd: &CommandLine<'_>| {
                    seen.push((
                        cmd.auth_token.to_string(),
                        cmd.package.to_string(),
                        cmd.target_address.to_string(),
                    ));
                    Ok(())
                },
                &mut findings,
            )
            .unwrap();
        assert_eq!(
            seen,
            vec![(
                "tok".to_string(),
                "pkg".to_string(),
                "to@example.org".to_string()
            )]
        );
    }

    #[test]
    fn test_events_reported() {
        let pkgs = packages();
        let observer = RecordingObserver::default();
        let scanner = BodyScanner::new(&pkgs, true, "user@example.com", &observer);
        let mut findings = BodyFindings::default();
        scanner
            .scan(
                "windows-bundle split\nsplit again\nlang: fa\n".lines(),
                allow_all,
                &mut findings,
            )
            .unwrap();
        assert_eq!(
            observer.events(),
            vec![
                RequestEvent::PackageRequested {
                    package: "windows-bundle".to_string()
                },
                RequestEvent::SplitDelivery,
                RequestEvent::LocaleRequested {
                    locale: "fa".to_string(),
                    source: LocaleSource::LangDirective
                },
            ]
        );
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<a href=\"x\">link</a>"), "link");
        assert_eq!(strip_markup("no tags"), "no tags");
        assert_eq!(strip_markup("1 < 2"), "1 < 2");
    }

    #[test]
    fn test_is_quoted() {
        assert!(is_quoted("> quoted"));
        assert!(is_quoted("   >> nested"));
        assert!(!is_quoted("not > quoted"));
    }
}
