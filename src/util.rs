use crate::param::STATUS_CODES;

pub struct HtmlBuilder {
    title: String,
    css: String,
    script: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => match STATUS_CODES.get(&code) {
                Some(d) => *d,
                None => {
                    panic!("非法的状态码：{}", code);
                }
            },
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self {
            title,
            css,
            script: "".to_string(),
            body,
        }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <!-- 本文件由shaneyale的websupport自动生成 -->
            <html>
                <head>
                    <meta charset="utf-8">
                    <script>{}</script>
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.script, self.title, self.css, self.body
        )
    }
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size() {
        let a = 9926;
        let b = 51800;
        assert_eq!(format_file_size(a), "9.7 KB".to_string());
        assert_eq!(format_file_size(b), "50.6 KB".to_string());
    }

    #[test]
    fn test_file_size_bytes() {
        assert_eq!(format_file_size(0), "0.0 B");
        assert_eq!(format_file_size(512), "512.0 B");
        assert_eq!(format_file_size(1023), "1023.0 B");
    }

    #[test]
    fn test_file_size_kb() {
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
    }

    #[test]
    fn test_file_size_mb() {
        assert_eq!(format_file_size(1048576), "1.0 MB");
        assert_eq!(format_file_size(5242880), "5.0 MB");
    }

    #[test]
    fn test_file_size_gb() {
        assert_eq!(format_file_size(1073741824), "1.0 GB");
        assert_eq!(format_file_size(3221225472), "3.0 GB");
    }

    #[test]
    fn test_file_size_tb() {
        assert_eq!(format_file_size(1099511627776), "1.0 TB");
    }

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404, Some("测试404")).build();
        assert!(html.contains("404"));
        assert!(html.contains("测试404"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_from_status_code_no_note() {
        let html = HtmlBuilder::from_status_code(200, None).build();
        assert!(html.contains("200"));
        assert!(html.contains("OK"));
    }

    #[test]
    #[should_panic(expected = "非法的状态码")]
    fn test_html_builder_invalid_status_code() {
        HtmlBuilder::from_status_code(999, None);
    }

    #[test]
    fn test_html_builder_various_codes() {
        for code in [200, 204, 400, 403, 404, 500, 503] {
            let html = HtmlBuilder::from_status_code(code, None).build();
            assert!(html.contains(&code.to_string()));
            assert!(html.contains("<!DOCTYPE html>"));
        }
    }

    #[test]
    fn test_html_builder_structure() {
        let html = HtmlBuilder::from_status_code(404, Some("测试")).build();

        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("<html>"));
        assert!(html.contains("</html>"));
        assert!(html.contains("<head>"));
        assert!(html.contains("</head>"));
        assert!(html.contains("<body>"));
        assert!(html.contains("</body>"));
        assert!(html.contains("<title>"));
        assert!(html.contains("</title>"));
        assert!(html.contains("<style>"));
        assert!(html.contains("</style>"));
        assert!(html.contains("charset=\"utf-8\""));
    }

    #[test]
    fn test_format_file_size_edge_cases() {
        assert_eq!(format_file_size(1024 - 1), "1023.0 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1024 * 1024 - 1), "1024.0 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
    }
}
