#[tokio::main]
async fn main() {
    wallscore::run().await;
}
