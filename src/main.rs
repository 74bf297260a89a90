fn main() {
    pixelweight_lib::run()
}
