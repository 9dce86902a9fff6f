use crate::Emulator;
use axum::{extract::State, response::Html};
use std::sync::Arc;

pub async fn render_dashboard(State(emulator): State<Arc<Emulator>>) -> Html<String> {
    let mut html = String::from(
        r#"
        <!DOCTYPE html>
        <html>
        <head>
            <meta charset="UTF-8">
            <meta name="viewport" content="width=device-width, initial-scale=1.0">
            <title>CloudEmu Dashboard</title>
            <style>
                :root { --primary: #3498db; --secondary: #2c3e50; --bg: #f5f7fa; --card-bg: #ffffff; --text: #333; }
                body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 0; background-color: var(--bg); color: var(--text); }
                .container { max-width: 1200px; margin: 0 auto; padding: 2rem; }
                header { display: flex; align-items: center; justify-content: space-between; margin-bottom: 2rem; }
                .card { background: var(--card-bg); border-radius: 12px; box-shadow: 0 8px 16px rgba(0,0,0,0.05); margin-bottom: 2rem; padding: 1.5rem; }
                h1 { margin: 0; color: var(--secondary); font-size: 2rem; }
                h2 { margin-top: 0; border-bottom: 2px solid var(--bg); padding-bottom: 0.5rem; color: var(--primary); font-size: 1.25rem; }
                ul { list-style: none; padding: 0; margin: 0; }
                li { padding: 0.75rem 0; border-bottom: 1px solid #f0f0f0; display: flex; flex-direction: column; }
                li:last-child { border-bottom: none; }
                .res-name { font-weight: 600; color: var(--secondary); margin-bottom: 0.2rem; }
                .res-meta { font-size: 0.85rem; color: #7f8c8d; font-family: monospace; word-break: break-all; }
                .badge { background: #34495e; color: white; padding: 0.25rem 0.6rem; border-radius: 20px; font-size: 0.75rem; font-weight: bold; }
                .empty { color: #bdc3c7; font-style: italic; text-align: center; padding: 1rem; }
            </style>
        </head>
        <body>
            <div class="container">
                <header>
                    <h1>CloudEmu Dashboard</h1>
                    <span class="badge">RUNNING</span>
                </header>
"#,
    );

    #[cfg(feature = "object")]
    {
        html.push_str("<div class=\"card\"><h2>Buckets</h2><ul>");
        match emulator.s3.storage.list_buckets() {
            Ok(buckets) if !buckets.is_empty() => {
                for b in buckets {
                    html.push_str(&format!(
                        "<li><span class='res-name'>{}</span><span class='res-meta'>Region: {} | Created: {}</span></li>",
                        b.name, b.region, b.created_at
                    ));
                }
            }
            _ => html.push_str("<li class='empty'>No buckets created</li>"),
        }
        html.push_str("</ul></div>");
    }

    #[cfg(feature = "kv")]
    {
        html.push_str("<div class=\"card\"><h2>Tables</h2><ul>");
        match emulator.dynamodb.storage.list_tables() {
            Ok(names) if !names.is_empty() => {
                for name in names {
                    html.push_str(&format!("<li><span class='res-name'>{name}</span></li>"));
                }
            }
            _ => html.push_str("<li class='empty'>No tables created</li>"),
        }
        html.push_str("</ul></div>");
    }

    #[cfg(feature = "functions")]
    {
        html.push_str("<div class=\"card\"><h2>Functions</h2><ul>");
        match emulator.lambda.storage.list_functions() {
            Ok(functions) if !functions.is_empty() => {
                for f in functions {
                    html.push_str(&format!(
                        "<li><span class='res-name'>{}</span><span class='res-meta'>Runtime: {} | Handler: {}</span><span class='res-meta'>ARN: {}</span></li>",
                        f.name, f.runtime, f.handler, f.arn
                    ));
                }
            }
            _ => html.push_str("<li class='empty'>No functions created</li>"),
        }
        html.push_str("</ul></div>");
    }

    #[cfg(feature = "queue")]
    {
        html.push_str("<div class=\"card\"><h2>Queues</h2><ul>");
        let queues = emulator.sqs.queues.list_queues();
        if queues.is_empty() {
            html.push_str("<li class='empty'>No queues created</li>");
        } else {
            for name in queues {
                html.push_str(&format!("<li><span class='res-name'>{name}</span><span class='res-meta'>URL: {}</span></li>", emulator.sqs.queue_url(&name)));
            }
        }
        html.push_str("</ul></div>");
    }

    #[cfg(feature = "pubsub")]
    {
        html.push_str("<div class=\"card\"><h2>Topics</h2><ul>");
        match emulator.sns.storage.list_topics() {
            Ok(topics) if !topics.is_empty() => {
                for t in topics {
                    html.push_str(&format!("<li><span class='res-name'>{}</span><span class='res-meta'>ARN: {}</span></li>", t.name, t.arn));
                }
            }
            _ => html.push_str("<li class='empty'>No topics created</li>"),
        }
        html.push_str("</ul></div>");
    }

    html.push_str("</div></body></html>");
    Html(html)
}
