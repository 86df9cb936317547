use restwire::{Handler, Request, Response, Server};
use tracing_subscriber::EnvFilter;

struct Echo;

impl Handler for Echo {
    async fn handle(&self, req: &Request, resp: &mut Response) {
        resp.append(req.request_type().as_str())
            .append(" ")
            .append(req.path())
            .append(" ")
            .append(req.version().as_str())
            .append("\n\nheaders:\n");

        for (key, value) in req.headers() {
            resp.append("  ").append(key).append(": ").append(value).append("\n");
        }

        resp.append("\nvalues:\n");
        for (key, value) in req.values() {
            resp.append("  ").append(key).append(" = ").append(value).append("\n");
        }

        resp.append("\nclient: ")
            .append(req.client_addr().to_string())
            .append("\nbody: ")
            .append(req.body().len())
            .append(" bytes\n");
    }
}

#[tokio::main]
async fn main() -> Result<(), restwire::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    Server::builder()
        .bind("127.0.0.1:8080".parse().unwrap())?
        .handler(Echo)
        .build()?
        .launch()
        .await;

    Ok(())
}
